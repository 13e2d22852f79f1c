//! Immutable template bytes
//!
//! MuPDF and lopdf both take ownership of the buffer they parse, so the
//! loader's copy is never handed out directly. Every consumer receives a
//! fresh duplicate.

use std::fmt;
use std::sync::Arc;

/// The one shared copy of a template's raw bytes
#[derive(Clone, PartialEq, Eq)]
pub struct TemplateBytes {
    data: Arc<[u8]>,
}

impl TemplateBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }

    /// Byte length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fresh owned copy to hand to a parsing or writing engine
    pub fn duplicate(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Leading bytes, for format sniffing only
    pub fn header(&self) -> &[u8] {
        &self.data[..self.data.len().min(1024)]
    }
}

impl fmt::Debug for TemplateBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateBytes")
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_is_independent() {
        let bytes = TemplateBytes::new(b"%PDF-1.7 body".to_vec());
        let mut copy = bytes.duplicate();
        copy.clear();

        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes.duplicate(), b"%PDF-1.7 body".to_vec());
    }

    #[test]
    fn test_clone_shares_storage() {
        let bytes = TemplateBytes::new(vec![1, 2, 3]);
        let other = bytes.clone();
        assert_eq!(bytes, other);
        assert_eq!(other.header(), &[1, 2, 3]);
    }
}
