use std::fs;
use std::path::Path;

use scandoc_core::types::{AugmentedPrompt, RetrievalResult};
use scandoc_core::{Error, Result};

pub const DEFAULT_TEMPLATE: &str = "\
You are a helpful assistant answering questions about the documents below.
Use only the information in the DOCUMENTS section. If the answer is not there, say that you do not know.

QUESTION:
{question}

DOCUMENTS:
{documents}
";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Question,
    Documents,
}

/// A parsed prompt template.
///
/// `{question}` and `{documents}` are the only placeholders; `{{` and `}}`
/// produce literal braces. Retrieved documents render one per paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    parts: Vec<Part>,
}

impl Default for PromptTemplate {
    /// `DEFAULT_TEMPLATE`, already split into parts.
    fn default() -> Self {
        Self {
            parts: vec![
                Part::Text(
                    "You are a helpful assistant answering questions about the documents below.\n\
                     Use only the information in the DOCUMENTS section. If the answer is not there, \
                     say that you do not know.\n\nQUESTION:\n"
                        .to_string(),
                ),
                Part::Question,
                Part::Text("\n\nDOCUMENTS:\n".to_string()),
                Part::Documents,
                Part::Text("\n".to_string()),
            ],
        }
    }
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((at, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => return Err(Error::Template(format!("unmatched '}}' at byte {at}"))),
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(Error::Template(format!("nested '{{' in placeholder at byte {at}"))),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(Error::Template(format!("unclosed placeholder at byte {at}")));
                    }
                    let part = match name.as_str() {
                        "question" => Part::Question,
                        "documents" => Part::Documents,
                        other => return Err(Error::Template(format!("unknown placeholder '{{{other}}}'"))),
                    };
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(part);
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Ok(Self { parts })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .map_err(|e| Error::Template(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&source)
    }

    pub fn render(&self, question: &str, documents: &[String]) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Question => out.push_str(question),
                Part::Documents => out.push_str(&documents.join("\n\n")),
            }
        }
        out
    }
}

/// Binds the question and the retrieved chunk texts, in ranked order.
pub fn assemble(question: &str, retrieved: &RetrievalResult, template: &PromptTemplate) -> AugmentedPrompt {
    let context = retrieved.texts();
    let text = template.render(question, &context);
    AugmentedPrompt { question: question.to_string(), context, text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scandoc_core::types::{Chunk, Meta, ScoredChunk};

    fn hits(texts: &[&str]) -> RetrievalResult {
        RetrievalResult {
            hits: texts
                .iter()
                .enumerate()
                .map(|(i, t)| ScoredChunk {
                    chunk: Chunk { id: format!("doc:{i}"), text: t.to_string(), metadata: Meta::new() },
                    score: 1.0 - i as f32 * 0.1,
                })
                .collect(),
        }
    }

    #[test]
    fn binds_question_and_ranked_documents() {
        let t = PromptTemplate::parse("Q: {question}\n---\n{documents}").unwrap();
        let p = assemble("What exposes Pods?", &hits(&["A Service exposes Pods", "Pods run containers"]), &t);
        assert_eq!(p.context, vec!["A Service exposes Pods", "Pods run containers"]);
        assert_eq!(p.text, "Q: What exposes Pods?\n---\nA Service exposes Pods\n\nPods run containers");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let t = PromptTemplate::parse("{{json}} {question} }}").unwrap();
        assert_eq!(t.render("q", &[]), "{json} q }");
    }

    #[test]
    fn template_errors() {
        for bad in ["{input}", "{documents} {", "oops }", "{ques{tion}}", "{}"] {
            assert!(matches!(PromptTemplate::parse(bad), Err(Error::Template(_))), "{bad}");
        }
    }

    #[test]
    fn default_matches_the_published_template() {
        assert_eq!(PromptTemplate::parse(DEFAULT_TEMPLATE).unwrap(), PromptTemplate::default());
    }

    #[test]
    fn default_template_has_both_placeholders() {
        let t = PromptTemplate::default();
        let p = assemble("Why?", &hits(&["Because."]), &t);
        assert!(p.text.contains("QUESTION:\nWhy?"));
        assert!(p.text.contains("DOCUMENTS:\nBecause."));
    }

    #[test]
    fn empty_retrieval_renders_empty_documents() {
        let p = assemble("q", &RetrievalResult::default(), &PromptTemplate::parse("{question}|{documents}|").unwrap());
        assert_eq!(p.text, "q||");
        assert!(p.context.is_empty());
    }

    #[test]
    fn template_file_missing_is_template_error() {
        assert!(matches!(
            PromptTemplate::from_file(Path::new("/nonexistent/prompt.st")),
            Err(Error::Template(_))
        ));
    }
}
