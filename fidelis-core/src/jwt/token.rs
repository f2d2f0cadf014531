use serde_json::{Map, Value};

use crate::buffer::ByteBuffer;
use crate::error::{FidelisError, Result};

/// A compact-serialized JWS: `header.body.signature`, each base64url.
#[derive(Debug, Clone, PartialEq)]
pub struct Jwt {
    header: Map<String, Value>,
    body: Map<String, Value>,
    signed_data: ByteBuffer,
    signature: ByteBuffer,
}

impl Jwt {
    pub fn parse(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        let [header, body, signature] = parts.as_slice() else {
            return Err(FidelisError::parse(format!(
                "Invalid JWT: expected 3 segments, found {}",
                parts.len()
            )));
        };

        Ok(Self {
            header: decode_object(header, "header")?,
            body: decode_object(body, "body")?,
            signed_data: ByteBuffer::new(format!("{header}.{body}").into_bytes()),
            signature: ByteBuffer::from_base64_url(signature)?,
        })
    }

    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// The ASCII `header.body` the signature is computed over.
    pub fn signed_data(&self) -> &ByteBuffer {
        &self.signed_data
    }

    pub fn signature(&self) -> &ByteBuffer {
        &self.signature
    }

    /// The `alg` header parameter.
    pub fn algorithm(&self) -> Result<&str> {
        self.header
            .get("alg")
            .ok_or_else(|| FidelisError::parse("JWT header is missing 'alg'"))?
            .as_str()
            .ok_or_else(|| FidelisError::parse("JWT header 'alg' must be a string"))
    }
}

fn decode_object(segment: &str, name: &str) -> Result<Map<String, Value>> {
    let bytes = ByteBuffer::from_base64_url(segment)?;
    match serde_json::from_slice::<Value>(bytes.as_slice()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(FidelisError::parse(format!("JWT {name} must be a JSON object"))),
        Err(e) => Err(FidelisError::parse(format!("JWT {name} is not valid JSON: {e}"))),
    }
}
