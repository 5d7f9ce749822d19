//! Component preview extraction
//!
//! Pulls a component and its stylesheet out of a model response so they can
//! be handed to an external renderer.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::markdown::extract_fenced_block;

const CODE_LANGUAGES: [&str; 4] = ["typescript", "javascript", "jsx", "tsx"];
const DEFAULT_PROPS: &str = "{\n  \"children\": \"Hello World\"\n}";

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Could not find a code block (e.g., ```tsx) in the response to preview.")]
    MissingCode,

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewState {
    pub code: String,
    /// Empty when the response has no css block
    pub css: String,
    /// JSON object passed to the component
    pub props: String,
}

/// Build a preview from the first code block and the first css block
pub fn extract_preview(response: &str) -> Result<PreviewState, PreviewError> {
    let code = extract_fenced_block(response, &CODE_LANGUAGES)
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(PreviewError::MissingCode)?;
    let css = extract_fenced_block(response, &["css"]).map(str::trim).unwrap_or_default();

    Ok(PreviewState {
        code: code.to_string(),
        css: css.to_string(),
        props: DEFAULT_PROPS.to_string(),
    })
}

impl PreviewState {
    /// Write `component.tsx`, `styles.css` and `props.json` into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, PreviewError> {
        fs::create_dir_all(dir).map_err(|source| PreviewError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(3);
        for (name, content) in [
            ("component.tsx", &self.code),
            ("styles.css", &self.css),
            ("props.json", &self.props),
        ] {
            let path = dir.join(name);
            fs::write(&path, content).map_err(|source| PreviewError::Io {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_css() {
        let response = "Here:\n```css\n.btn { color: red; }\n```\n```tsx\nexport const A = () => <b/>;\n```";
        let preview = extract_preview(response).unwrap();
        assert_eq!(preview.code, "export const A = () => <b/>;");
        assert_eq!(preview.css, ".btn { color: red; }");
        assert_eq!(preview.props, "{\n  \"children\": \"Hello World\"\n}");
    }

    #[test]
    fn test_css_is_optional_code_is_not() {
        let preview = extract_preview("```javascript\nconst x = 1;\n```").unwrap();
        assert_eq!(preview.css, "");

        assert!(matches!(
            extract_preview("```css\nbody {}\n```"),
            Err(PreviewError::MissingCode)
        ));
        assert!(matches!(extract_preview("```tsx\n\n```"), Err(PreviewError::MissingCode)));
    }

    #[test]
    fn test_write_to() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("target")
            .join("test-scratch")
            .join(format!("preview-{}", uuid::Uuid::new_v4()));
        let preview = extract_preview("```jsx\n<div/>\n```").unwrap();
        let files = preview.write_to(&dir).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(fs::read_to_string(dir.join("component.tsx")).unwrap(), "<div/>");
    }
}
