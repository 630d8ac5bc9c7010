//! Id utilities

use uuid::Uuid;

/// Generate a new record id (UUIDv4)
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse an id from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_parseable() {
        let id = new_id();
        assert!(parse(&id).is_ok());
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
