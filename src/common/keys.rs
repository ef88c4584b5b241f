//! Mapping between logical keys and object store keys

/// Suffix of the object guarding a logical key
pub const LOCK_SUFFIX: &str = ".lock";

/// Maps logical keys into the configured namespace and back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapper {
    prefix: String,
}

impl KeyMapper {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: segments(prefix).collect::<Vec<_>>().join("/"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>/<key>`, leading slashes on the key dropped. With a prefix,
    /// empty segments (`a//b`, trailing `/`) are collapsed.
    pub fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            return key.trim_start_matches('/').to_string();
        }
        let mut joined = self.prefix.clone();
        for segment in segments(key) {
            joined.push('/');
            joined.push_str(segment);
        }
        joined
    }

    pub fn lock_key(&self, key: &str) -> String {
        self.object_key(key) + LOCK_SUFFIX
    }

    /// Object key prefix to list under for a logical prefix
    pub fn list_prefix(&self, prefix: &str) -> String {
        let mut list_prefix = self.object_key(prefix);
        if !list_prefix.is_empty() && !list_prefix.ends_with('/') {
            list_prefix.push('/');
        }
        list_prefix
    }

    /// Strip the namespace back off an object key
    pub fn logical_key<'a>(&self, object_key: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            return object_key;
        }
        object_key
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(object_key)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Does this object key name a lock object?
pub fn is_lock_key(key: &str) -> bool {
    key.ends_with(LOCK_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        let keys = KeyMapper::new("certmagic");
        assert_eq!(
            keys.object_key("certificates/example.com/example.com.crt"),
            "certmagic/certificates/example.com/example.com.crt"
        );
        assert_eq!(keys.object_key("/acme/x"), "certmagic/acme/x");
        assert_eq!(keys.object_key(""), "certmagic");
        assert_eq!(keys.lock_key("acme/x"), "certmagic/acme/x.lock");
    }

    #[test]
    fn test_object_key_collapses_separators() {
        let keys = KeyMapper::new("certmagic");
        assert_eq!(keys.object_key("a//b"), "certmagic/a/b");
        assert_eq!(keys.object_key("a///b//c.crt"), "certmagic/a/b/c.crt");
        assert_eq!(keys.lock_key("acme//x/"), "certmagic/acme/x.lock");
        assert_eq!(keys.list_prefix("a//"), "certmagic/a/");

        let nested = KeyMapper::new("tls//certs/");
        assert_eq!(nested.prefix(), "tls/certs");
        assert_eq!(nested.object_key("a"), "tls/certs/a");
    }

    #[test]
    fn test_object_key_without_prefix() {
        let keys = KeyMapper::new("");
        assert_eq!(keys.object_key("/a/b"), "a/b");
        assert_eq!(keys.lock_key("a/b"), "a/b.lock");
        assert_eq!(keys.list_prefix(""), "");
        assert_eq!(keys.list_prefix("a"), "a/");
        assert_eq!(keys.logical_key("a/b"), "a/b");
    }

    #[test]
    fn test_list_prefix() {
        let keys = KeyMapper::new("/certmagic/");
        assert_eq!(keys.prefix(), "certmagic");
        assert_eq!(keys.list_prefix(""), "certmagic/");
        assert_eq!(keys.list_prefix("a/"), "certmagic/a/");
        assert_eq!(keys.list_prefix("a"), "certmagic/a/");
    }

    #[test]
    fn test_logical_key() {
        let keys = KeyMapper::new("certmagic");
        assert_eq!(keys.logical_key("certmagic/a/b"), "a/b");
        assert_eq!(keys.logical_key("certmagicx/a"), "certmagicx/a");
        assert!(is_lock_key("certmagic/a/b.lock"));
        assert!(!is_lock_key("certmagic/a/b.locked"));
    }
}
