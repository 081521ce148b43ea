//! URL-safe campaign identifiers. Allocation pre-checks against live rows
//! through the caller's transaction, but the unique constraint on
//! `campaigns.slug` remains the authority at insert time; a lost race
//! surfaces as a unique violation and the caller retries with the random
//! variant.

use std::collections::HashSet;

use rand::Rng;
use rand::distr::Alphanumeric;
use rusqlite::Connection;

use rally_db::DbError;
use rally_db::queries;

const MIN_LENGTH: usize = 3;
const RANDOM_SUFFIX_LENGTH: usize = 6;

/// Normalize a title into slug form: lowercase, keep `[a-z0-9]`, collapse
/// whitespace/hyphen runs into single hyphens, trim the ends, pad short
/// results to three characters with trailing `x`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() {
            pending_hyphen = true;
        }
        // anything else is dropped
    }

    while slug.len() < MIN_LENGTH {
        slug.push('x');
    }
    slug
}

/// Deterministic allocation: the base slug when free, otherwise the first
/// free `base-1`, `base-2`, … `exclude_id` skips the campaign being renamed.
pub fn allocate(
    conn: &Connection,
    title: &str,
    exclude_id: Option<&str>,
) -> Result<String, DbError> {
    let base = slugify(title);
    let taken: HashSet<String> =
        queries::slugs_matching(conn, &base, exclude_id)?.into_iter().collect();

    if !taken.contains(&base) {
        return Ok(base);
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Collision-retry variant: a short random alphanumeric suffix instead of a
/// counter, so two concurrent creators converge without another race on the
/// same next counter value.
pub fn allocate_random(conn: &Connection, title: &str) -> Result<String, DbError> {
    let base = slugify(title);
    let taken: HashSet<String> =
        queries::slugs_matching(conn, &base, None)?.into_iter().collect();

    loop {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LENGTH)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        let candidate = format!("{base}-{suffix}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }
}
