//! Loading of forge compilation artifacts

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ScriptError;

/// A compiled contract: its ABI and creation bytecode
#[derive(Clone, Debug)]
pub struct ContractArtifact {
    /// The contract name
    pub name: String,
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// The init code for a deployment, i.e. the bytecode followed by the
    /// ABI-encoded constructor arguments
    pub fn init_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(constructor_args);
        code.into()
    }

    /// Whether the ABI declares a function with the given name
    pub fn has_function(&self, name: &str) -> bool {
        self.abi.functions.contains_key(name)
    }
}

/// The two shapes forge and solc emit for the bytecode field
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// A bare hex string
    Hex(String),
    /// An object with the hex string under `object`
    Object {
        /// The hex-encoded bytecode
        object: String,
    },
}

impl RawBytecode {
    /// The hex string, regardless of shape
    fn into_hex(self) -> String {
        match self {
            RawBytecode::Hex(hex) | RawBytecode::Object { object: hex } => hex,
        }
    }
}

/// The path at which forge writes the artifact of the given contract
pub fn artifact_path(artifact_dir: &Path, contract_name: &str) -> PathBuf {
    artifact_dir.join(format!("{contract_name}.sol")).join(format!("{contract_name}.json"))
}

/// Load the artifact of `contract_name` from the forge output directory
pub fn load_named_artifact(
    artifact_dir: &Path,
    contract_name: &str,
) -> Result<ContractArtifact, ScriptError> {
    load_artifact(&artifact_path(artifact_dir, contract_name))
}

/// Read and validate a compilation artifact.
///
/// The artifact must contain a non-empty `abi` list and a non-empty `bytecode`,
/// given either as a hex string or as `{ "object": "0x..." }`.
pub fn load_artifact(path: &Path) -> Result<ContractArtifact, ScriptError> {
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ScriptError::ArtifactNotFound(path.display().to_string()),
        _ => ScriptError::ArtifactMalformed(format!("{}: {}", path.display(), e)),
    })?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    parse_artifact(&name, &contents)
        .map_err(|e| ScriptError::ArtifactMalformed(format!("{}: {}", path.display(), e)))
}

/// Parse the JSON contents of an artifact
fn parse_artifact(name: &str, contents: &str) -> Result<ContractArtifact, String> {
    let mut json: Value = serde_json::from_str(contents).map_err(|e| e.to_string())?;

    let abi_json = json
        .get_mut("abi")
        .map(Value::take)
        .ok_or("missing `abi` field")?;
    match abi_json.as_array() {
        Some(entries) if !entries.is_empty() => {}
        Some(_) => return Err("`abi` is empty".to_string()),
        None => return Err("`abi` is not a list".to_string()),
    }
    let abi: JsonAbi =
        serde_json::from_value(abi_json).map_err(|e| format!("invalid `abi`: {e}"))?;

    let bytecode_json = json
        .get_mut("bytecode")
        .map(Value::take)
        .ok_or("missing `bytecode` field")?;
    let bytecode_hex = serde_json::from_value::<RawBytecode>(bytecode_json)
        .map_err(|_| "`bytecode` is neither a string nor an object with `object`")?
        .into_hex();
    let bytecode: Bytes =
        bytecode_hex.parse().map_err(|e| format!("invalid `bytecode` hex: {e}"))?;
    if bytecode.is_empty() {
        return Err("`bytecode` is empty".to_string());
    }

    Ok(ContractArtifact {
        name: name.to_string(),
        abi,
        bytecode,
    })
}
