//! Row mapping helpers shared by the domain modules

use sqlx::sqlite::SqliteRow;

use belfry::prelude::*;

pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> BfResult<T>
where
	F: FnOnce(&SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(&row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>>,
) -> BfResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Comma-separated list column, empty string meaning no entries
pub(crate) fn parse_str_list(s: &str) -> Box<[Box<str>]> {
	if s.is_empty() {
		return Box::new([]);
	}
	s.split(',').map(|s| s.trim().to_owned().into_boxed_str()).collect()
}


// vim: ts=4
