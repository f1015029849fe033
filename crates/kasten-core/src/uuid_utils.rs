//! UUID helpers.
//!
//! All primary keys use UUIDv7 so that btree inserts stay append-mostly and
//! ids sort by creation time.

use uuid::Uuid;

/// Generate a new time-ordered UUIDv7.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_version() {
        let id = new_v7();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_ordering() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }
}
