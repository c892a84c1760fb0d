use camino::Utf8Path;
use serde_json::Value;

/// Extensions the loader reads, longest first so `.tf.json` wins over `.json`.
pub const CONFIG_EXTENSIONS: &[&str] = &[".tf.json", ".tf"];

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{0}")]
    Hcl(#[from] hcl::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// Turns file text into the generic ordered tree the engine consumes.
pub trait Decoder: Send + Sync {
    fn decode(&self, text: &str) -> Result<Value, DecodeError>;
}

/// HashiCorp configuration language (`.tf`, `.tfvars`).
///
/// Expressions that are not plain literals arrive as `${...}` strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct HclDecoder;

impl Decoder for HclDecoder {
    fn decode(&self, text: &str) -> Result<Value, DecodeError> {
        let value: hcl::Value = hcl::from_str(text)?;
        Ok(serde_json::to_value(value)?)
    }
}

/// JSON configuration syntax (`.tf.json`) and JSON variable files.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, text: &str) -> Result<Value, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Decoder for a configuration file, or `None` when the loader should skip it.
pub fn config_decoder(path: &Utf8Path) -> Option<&'static dyn Decoder> {
    let name = path.file_name()?;
    if name.ends_with(".tf.json") {
        Some(&JsonDecoder)
    } else if name.ends_with(".tf") {
        Some(&HclDecoder)
    } else {
        None
    }
}

/// Decoder for a variable file: `.json` is JSON, anything else (`.tfvars`) is HCL.
pub fn variable_file_decoder(path: &Utf8Path) -> &'static dyn Decoder {
    match path.extension() {
        Some("json") => &JsonDecoder,
        _ => &HclDecoder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hcl_blocks_become_nested_objects() {
        let value = HclDecoder
            .decode(
                r#"
resource "aws_s3_bucket" "logs" {
  acl    = "private"
  bucket = "logs-${var.env}"
}
"#,
            )
            .expect("decode");
        let bucket = &value["resource"]["aws_s3_bucket"]["logs"];
        assert_eq!(bucket["acl"], json!("private"));
        assert_eq!(bucket["bucket"], json!("logs-${var.env}"));
    }

    #[test]
    fn hcl_traversals_become_interpolations() {
        let value = HclDecoder
            .decode("locals {\n  id = var.vpc_id\n}\n")
            .expect("decode");
        let id = value["locals"]["id"].as_str().expect("string");
        assert!(id.contains("var.vpc_id"), "{id}");
    }

    #[test]
    fn hcl_errors_are_reported() {
        assert!(matches!(
            HclDecoder.decode("resource {"),
            Err(DecodeError::Hcl(_))
        ));
    }

    #[test]
    fn decoders_follow_file_names() {
        assert!(config_decoder(Utf8Path::new("/m/main.tf")).is_some());
        assert!(config_decoder(Utf8Path::new("/m/main.tf.json")).is_some());
        assert!(config_decoder(Utf8Path::new("/m/vars.tfvars")).is_none());
        assert!(config_decoder(Utf8Path::new("/m/README.md")).is_none());
        assert!(
            variable_file_decoder(Utf8Path::new("x.json"))
                .decode("{\"a\": 1}")
                .is_ok()
        );
    }
}
