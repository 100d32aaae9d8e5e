//! Patient identifier generation.

use uuid::Uuid;

const UID_PREFIX: &str = "PAT";
const SUFFIX_LEN: usize = 4;

/// Generates a human-facing patient identifier: `PAT-<year>-<4 alphanumerics>`.
///
/// The suffix is the first four characters of a random UUID, upper-cased.
/// Uniqueness is enforced by storage; callers retry on collision.
pub fn generate_patient_uid(year: i32) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{UID_PREFIX}-{year}-{suffix}")
}

/// Returns `true` if `value` has the `PAT-<year>-<XXXX>` shape.
pub fn is_patient_uid(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some(prefix), Some(year), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    prefix == UID_PREFIX
        && year.len() == 4
        && year.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}
