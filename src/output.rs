use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

/// Serialized form of `payload`, or `None` for human output, which each
/// command prints itself.
pub fn structured<T: Serialize>(payload: &T, format: OutputFormat) -> Result<Option<String>> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(payload)?,
        OutputFormat::Yaml => serde_yaml::to_string(payload)?,
        OutputFormat::Human => return Ok(None),
    };
    Ok(Some(rendered))
}

/// Prints `payload` in a structured format. Returns `false` when the caller
/// should print the human rendition instead.
pub fn emit_structured<T: Serialize>(payload: &T, format: OutputFormat) -> Result<bool> {
    match structured(payload, format)? {
        Some(rendered) => {
            println!("{}", rendered.trim_end());
            Ok(true)
        }
        None => Ok(false),
    }
}
