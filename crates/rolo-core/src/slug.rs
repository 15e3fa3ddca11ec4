//! Slug derivation for contacts, lookup tables and usernames.

/// Fallback used when a name contains no slug-safe characters.
const EMPTY_SLUG: &str = "item";

/// Lowercase `text`, keep ASCII alphanumerics and collapse every other run of
/// characters into a single `-`.
pub fn slugify(text: &str) -> String {
  let mut slug = String::with_capacity(text.len());
  let mut pending_dash = false;

  for ch in text.chars() {
    if ch.is_ascii_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.push(ch.to_ascii_lowercase());
    } else {
      pending_dash = true;
    }
  }

  if slug.is_empty() {
    EMPTY_SLUG.to_owned()
  } else {
    slug
  }
}

/// Slugify `text`, appending `-2`, `-3`, … until `is_taken` rejects the
/// candidate.
pub fn slugify_uniquely(text: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
  let base = slugify(text);
  if !is_taken(&base) {
    return base;
  }

  let mut suffix = 2_u32;
  loop {
    let candidate = format!("{base}-{suffix}");
    if !is_taken(&candidate) {
      return candidate;
    }
    suffix += 1;
  }
}
