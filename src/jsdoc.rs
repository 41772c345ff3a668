use swc_atoms::JsWord;

use crate::types::JsType;

/// The slice of JSDoc the analysis consumes. Parsed once from a `/** ... */`
/// comment and attached to the following declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsDocInfo {
    pub modifies_this: bool,
    pub modifies_arguments: bool,
    pub thrown_types: Vec<JsWord>,
    pub no_side_effects: bool,
    pub return_type: Option<JsType>,
}

impl JsDocInfo {
    pub fn has_side_effects_arguments_annotation(&self) -> bool {
        self.modifies_arguments
    }
}

/// Extracts the tags we understand from the body of a doc comment (the text
/// between `/**` and `*/`). Unknown tags are ignored.
pub fn parse(text: &str) -> JsDocInfo {
    let mut info = JsDocInfo::default();

    let mut rest = text;
    while let Some(at) = rest.find('@') {
        rest = &rest[at + 1..];
        let tag: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        rest = &rest[tag.len()..];

        match tag.as_str() {
            "nosideeffects" => info.no_side_effects = true,
            "modifies" => match braced_payload(rest) {
                Some("this") => info.modifies_this = true,
                Some("arguments") => info.modifies_arguments = true,
                _ => {}
            },
            "throws" => {
                let ty = braced_payload(rest).unwrap_or("?");
                info.thrown_types.push(JsWord::from(ty));
            }
            "return" | "returns" => {
                if let Some(ty) = braced_payload(rest) {
                    info.return_type = Some(JsType::from_annotation(ty));
                }
            }
            _ => {}
        }
    }

    info
}

/// The `{...}` payload immediately following a tag name, trimmed.
fn braced_payload(rest: &str) -> Option<&str> {
    let rest = rest.trim_start_matches(|c: char| c == ' ' || c == '\t' || c == '*');
    let inner = rest.strip_prefix('{')?;
    let end = inner.find('}')?;
    Some(inner[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_side_effect_tags() {
        let info = parse(" * @nosideeffects\n * @return {number}\n");
        assert!(info.no_side_effects);
        assert_eq!(info.return_type, Some(JsType::Primitive));

        let info = parse("@modifies {this}");
        assert!(info.modifies_this);
        assert!(!info.modifies_arguments);

        let info = parse("@modifies {arguments}");
        assert!(info.modifies_arguments);

        let info = parse("@throws {Error} when unhappy");
        assert_eq!(info.thrown_types.len(), 1);
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let info = parse("@param {number} x\n@see elsewhere");
        assert_eq!(info, JsDocInfo::default());
    }
}
