//! Git blob ids computed over raw bytes.
//!
//! A blob id is the object-format hash of `blob <len>\0` followed by the
//! content, so a digest of a live response body compares directly against
//! tree entries.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::models::{ObjectFormat, ObjectId};

/// Compute the blob id `git hash-object` would assign to `body`.
pub fn blob_id(format: ObjectFormat, body: &[u8]) -> ObjectId {
    match format {
        ObjectFormat::Sha1 => hash_with::<Sha1>(body),
        ObjectFormat::Sha256 => hash_with::<Sha256>(body),
    }
}

fn hash_with<D: Digest>(body: &[u8]) -> ObjectId {
    let mut hasher = D::new();
    hasher.update(format!("blob {}\0", body.len()).as_bytes());
    hasher.update(body);
    ObjectId::from_digest(&hasher.finalize())
}
