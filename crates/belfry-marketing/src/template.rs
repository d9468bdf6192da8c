//! Template resolution with field, content-block, and link substitution.
//!
//! Bodies may contain three token shapes:
//! - `{{field}}` - replaced by the matching recipient/organisation field;
//!   unknown fields resolve to an empty string, rendering never fails because
//!   of a missing optional field
//! - `{{block:KEY}}` - replaced by the named content block's body; plain
//!   field tokens inside the block are resolved, nested block/link tokens are
//!   left literal (single-depth expansion, so block cycles cannot loop)
//! - `{{link:KEY}}` - replaced by the resolved target URL; an
//!   organisation-specific override takes priority over the global default
//!
//! Unresolved block/link keys keep the literal placeholder so malformed
//! references stay visible instead of disappearing silently. Preview mode
//! resolves blocks and links only, leaving every plain token (including
//! `{{user:*}}`/`{{org:*}}`) literal so an admin never sees one recipient's
//! data. Given identical inputs the output is byte-identical.

use std::collections::HashMap;

use belfry_types::marketing_adapter::{ContentBlock, MarketingAdapter};

use crate::prelude::*;

const BLOCK_PREFIX: &str = "block:";
const LINK_PREFIX: &str = "link:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveMode {
	/// Resolve every token against the recipient/organisation context
	Full,
	/// Resolve blocks and links only; plain tokens stay literal
	Preview,
}

/// Which body variant of a content block to substitute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
	Html,
	Text,
}

struct Token<'t> {
	start: usize,
	end: usize,
	inner: &'t str,
}

/// Finds `{{...}}` tokens. Malformed tokens (no closing braces, or braces
/// inside the token) are left for the substitution pass to keep literal.
fn scan_tokens(body: &str) -> Vec<Token<'_>> {
	let mut tokens = Vec::new();
	let mut pos = 0;
	while let Some(open) = body[pos..].find("{{") {
		let open = pos + open;
		let Some(close) = body[open + 2..].find("}}") else { break };
		let close = open + 2 + close;
		tokens.push(Token { start: open, end: close + 2, inner: body[open + 2..close].trim() });
		pos = close + 2;
	}
	tokens
}

/// Read a field as display text; absent or null fields render as empty.
fn field_value(fields: &serde_json::Value, name: &str) -> String {
	match fields.get(name) {
		Some(serde_json::Value::String(s)) => s.clone(),
		Some(serde_json::Value::Number(n)) => n.to_string(),
		Some(serde_json::Value::Bool(b)) => b.to_string(),
		_ => String::new(),
	}
}

/// Substitute plain field tokens only; block/link tokens stay literal.
/// Used for the single-depth expansion of content block bodies.
fn resolve_fields_only(body: &str, fields: &serde_json::Value, mode: ResolveMode) -> String {
	let tokens = scan_tokens(body);
	let mut out = String::with_capacity(body.len());
	let mut cursor = 0;
	for token in &tokens {
		out.push_str(&body[cursor..token.start]);
		let resolved = if token.inner.contains('{')
			|| token.inner.contains('}')
			|| token.inner.starts_with(BLOCK_PREFIX)
			|| token.inner.starts_with(LINK_PREFIX)
			|| mode == ResolveMode::Preview
		{
			None
		} else {
			Some(field_value(fields, token.inner))
		};
		match resolved {
			Some(value) => out.push_str(&value),
			None => out.push_str(&body[token.start..token.end]),
		}
		cursor = token.end;
	}
	out.push_str(&body[cursor..]);
	out
}

/// Template resolver bound to a store and an optional organisation context.
pub struct Resolver<'a> {
	adapter: &'a dyn MarketingAdapter,
	org_id: Option<OrgId>,
}

impl<'a> Resolver<'a> {
	pub fn new(adapter: &'a dyn MarketingAdapter, org_id: Option<OrgId>) -> Self {
		Self { adapter, org_id }
	}

	/// Render a body against the given field context.
	///
	/// Block and link lookups are prefetched once per distinct key, then a
	/// single substitution pass produces the output, so resolution is
	/// deterministic and cycle-free by construction.
	pub async fn resolve(
		&self,
		body: &str,
		kind: BodyKind,
		fields: &serde_json::Value,
		mode: ResolveMode,
	) -> BfResult<String> {
		let tokens = scan_tokens(body);

		let mut blocks: HashMap<&str, Option<ContentBlock>> = HashMap::new();
		let mut links: HashMap<&str, Option<Box<str>>> = HashMap::new();
		for token in &tokens {
			if let Some(key) = token.inner.strip_prefix(BLOCK_PREFIX) {
				let key = key.trim();
				if !blocks.contains_key(key) {
					blocks.insert(key, self.adapter.read_content_block(key).await?);
				}
			} else if let Some(key) = token.inner.strip_prefix(LINK_PREFIX) {
				let key = key.trim();
				if !links.contains_key(key) {
					let link = self.adapter.read_link(key, self.org_id).await?;
					links.insert(key, link.map(|l| l.target_url));
				}
			}
		}

		let mut out = String::with_capacity(body.len());
		let mut cursor = 0;
		for token in &tokens {
			out.push_str(&body[cursor..token.start]);
			match Self::substitute(token.inner, kind, fields, mode, &blocks, &links) {
				Some(value) => out.push_str(&value),
				None => out.push_str(&body[token.start..token.end]),
			}
			cursor = token.end;
		}
		out.push_str(&body[cursor..]);
		Ok(out)
	}

	/// Resolve one token; None keeps the literal placeholder.
	fn substitute(
		inner: &str,
		kind: BodyKind,
		fields: &serde_json::Value,
		mode: ResolveMode,
		blocks: &HashMap<&str, Option<ContentBlock>>,
		links: &HashMap<&str, Option<Box<str>>>,
	) -> Option<String> {
		if inner.contains('{') || inner.contains('}') {
			return None;
		}
		if let Some(key) = inner.strip_prefix(BLOCK_PREFIX) {
			let block = blocks.get(key.trim())?.as_ref()?;
			let body = match kind {
				BodyKind::Html => &block.body_html,
				BodyKind::Text => block.body_text.as_deref().unwrap_or(&block.body_html),
			};
			Some(resolve_fields_only(body, fields, mode))
		} else if let Some(key) = inner.strip_prefix(LINK_PREFIX) {
			links.get(key.trim())?.as_ref().map(|url| url.to_string())
		} else {
			match mode {
				ResolveMode::Preview => None,
				ResolveMode::Full => Some(field_value(fields, inner)),
			}
		}
	}
}


// vim: ts=4
