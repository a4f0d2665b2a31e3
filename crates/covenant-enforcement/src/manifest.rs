// manifest.rs - Signed capability manifests.
//
// A manifest lists what a runtime can do under a covenant: one grant per
// permit statement. Its `manifest_hash` is the canonical-JSON SHA-256 of the
// content fields, and `runtime_signature` is the runtime key's Ed25519
// signature over that hash string. Anyone holding the manifest can check
// both without the covenant source or the private key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use covenant_ccl::Statement;
use covenant_crypto::{hash_object, verify_hex, CryptoError, KeyPair};

/// One permitted action/resource pair, as declared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityGrant {
    pub action: String,
    pub resource: String,
    /// The statement's `when` clause rendered back to CCL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

impl From<&Statement> for CapabilityGrant {
    fn from(statement: &Statement) -> Self {
        Self {
            action: statement.action.clone(),
            resource: statement.resource.clone(),
            conditions: statement.condition.as_ref().map(|c| c.to_string()),
        }
    }
}

/// A runtime's signed statement of its capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityManifest {
    pub covenant_id: String,
    pub capabilities: Vec<CapabilityGrant>,
    pub manifest_hash: String,
    pub runtime_type: String,
    pub runtime_signature: String,
    pub runtime_public_key: String,
    pub generated_at: DateTime<Utc>,
}

/// The hashed part of a manifest.
#[derive(Serialize)]
struct ManifestContent<'a> {
    covenant_id: &'a str,
    capabilities: &'a [CapabilityGrant],
    runtime_type: &'a str,
    runtime_public_key: &'a str,
    generated_at: &'a DateTime<Utc>,
}

impl CapabilityManifest {
    /// Build, hash and sign a manifest.
    pub fn issue(
        covenant_id: &str,
        capabilities: Vec<CapabilityGrant>,
        runtime_type: &str,
        key_pair: &KeyPair,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, CryptoError> {
        let mut manifest = Self {
            covenant_id: covenant_id.to_string(),
            capabilities,
            manifest_hash: String::new(),
            runtime_type: runtime_type.to_string(),
            runtime_signature: String::new(),
            runtime_public_key: key_pair.public_key_hex().to_string(),
            generated_at,
        };
        manifest.manifest_hash = manifest.content_hash()?;
        manifest.runtime_signature = key_pair.sign_hex(&manifest.manifest_hash);
        Ok(manifest)
    }

    /// Hash of the content fields as they are now.
    pub fn content_hash(&self) -> Result<String, CryptoError> {
        hash_object(&ManifestContent {
            covenant_id: &self.covenant_id,
            capabilities: &self.capabilities,
            runtime_type: &self.runtime_type,
            runtime_public_key: &self.runtime_public_key,
            generated_at: &self.generated_at,
        })
    }

    /// True when the content still hashes to `manifest_hash` and the
    /// signature over that hash checks out under `runtime_public_key`.
    pub fn verify(&self) -> bool {
        match self.content_hash() {
            Ok(hash) if hash == self.manifest_hash => verify_hex(
                &self.manifest_hash,
                &self.runtime_signature,
                &self.runtime_public_key,
            ),
            _ => false,
        }
    }
}
