//! Codec configuration.

/// What to do when a decoded integer or size lies outside its declared bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintPolicy {
    /// Fail the decode with [`CodecError::ConstraintViolation`](crate::CodecError::ConstraintViolation).
    #[default]
    Strict,
    /// Accept the value, keep decoding, and report a [`Warning::OutOfRange`](crate::codec::Warning::OutOfRange).
    Permissive,
}

/// Settings shared by every decode/encode call made through a [`Codec`](crate::Codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub constraint_policy: ConstraintPolicy,
    /// Octet-align the content of open types and of octet strings sent with a general length
    /// determinant. `false` is plain X.691 unaligned PER, which never aligns.
    pub align_open_content: bool,
    /// Maximum nesting of constructed types and references.
    pub max_depth: usize,
    /// Upper bound on the size of one encoded PDU.
    pub max_encoded_octets: Option<usize>,
    /// Upper bound on SEQUENCE OF elements read from one PDU, all lists together. Elements that
    /// encode in zero bits cost no input, so only this stops a short fragmented count from
    /// producing an arbitrarily long list.
    pub max_decoded_items: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            constraint_policy: ConstraintPolicy::Strict,
            align_open_content: true,
            max_depth: 64,
            max_encoded_octets: None,
            max_decoded_items: 1_000_000,
        }
    }
}

impl CodecConfig {
    pub fn permissive() -> Self {
        CodecConfig::default().with_constraint_policy(ConstraintPolicy::Permissive)
    }

    pub fn with_constraint_policy(mut self, policy: ConstraintPolicy) -> Self {
        self.constraint_policy = policy;
        self
    }

    pub fn with_open_content_alignment(mut self, align: bool) -> Self {
        self.align_open_content = align;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_encoded_octets(mut self, octets: usize) -> Self {
        self.max_encoded_octets = Some(octets);
        self
    }

    pub fn with_max_decoded_items(mut self, items: usize) -> Self {
        self.max_decoded_items = items;
        self
    }
}
