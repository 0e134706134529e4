//! Metadata mapping
//!
//! Translates an [`AssetDescriptor`] into the wire-level `init` request.
//! Optional fields are serialized as explicit `null` rather than omitted, so a
//! field that is not set stays distinguishable from one set to `""`.

use crate::types::{AssetDescriptor, EncodingType};
use serde::{Deserialize, Serialize};

/// Request body of `init_asset_upload` / `init_proposal_asset_upload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitAssetUpload {
    pub collection: String,
    pub full_path: String,
    pub name: String,
    pub token: Option<String>,
    pub encoding_type: Option<EncodingType>,
    pub description: Option<String>,
}

impl InitAssetUpload {
    /// Map a descriptor; content and headers are not part of `init`
    #[must_use]
    pub fn from_descriptor(descriptor: &AssetDescriptor) -> Self {
        Self {
            collection: descriptor.collection.clone(),
            full_path: descriptor.full_path.clone(),
            name: descriptor.filename.clone(),
            token: descriptor.token.clone(),
            encoding_type: descriptor.encoding,
            description: descriptor.description.clone(),
        }
    }
}

impl From<&AssetDescriptor> for InitAssetUpload {
    fn from(descriptor: &AssetDescriptor) -> Self {
        Self::from_descriptor(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use serde_json::json;

    #[test]
    fn maps_required_fields() {
        let descriptor = AssetDescriptor::new("images", "cat.png", Blob::default())
            .with_full_path("/images/pets/cat.png");
        let init = InitAssetUpload::from_descriptor(&descriptor);

        assert_eq!(init.collection, "images");
        assert_eq!(init.full_path, "/images/pets/cat.png");
        assert_eq!(init.name, "cat.png");
        assert!(init.token.is_none());
        assert!(init.encoding_type.is_none());
        assert!(init.description.is_none());
    }

    #[test]
    fn maps_optional_fields() {
        let descriptor = AssetDescriptor::new("docs", "a.js", Blob::default())
            .with_token("tok")
            .with_encoding(EncodingType::Gzip)
            .with_description("bundle");
        let init = InitAssetUpload::from(&descriptor);

        assert_eq!(init.token.as_deref(), Some("tok"));
        assert_eq!(init.encoding_type, Some(EncodingType::Gzip));
        assert_eq!(init.description.as_deref(), Some("bundle"));
    }

    #[test]
    fn absent_fields_are_explicit_on_the_wire() {
        let descriptor = AssetDescriptor::new("docs", "a.txt", Blob::default()).with_token("");
        let value = serde_json::to_value(InitAssetUpload::from_descriptor(&descriptor)).unwrap();

        assert_eq!(
            value,
            json!({
                "collection": "docs",
                "full_path": "/docs/a.txt",
                "name": "a.txt",
                "token": "",
                "encoding_type": null,
                "description": null,
            })
        );
    }
}
