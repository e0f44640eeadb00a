use super::types::RetrievedDocument;

pub const AUGMENT_HEADER: &str = "I found some relevant information in the following documents:";

/// Keyword heuristic deciding whether a message should consult the document store.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    keywords: Vec<String>,
}

impl RetrievalPolicy {
    /// Keywords are trimmed and lower-cased; blank entries are dropped.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Case-insensitive substring match against any keyword.
    pub fn should_retrieve(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self::new(["document", "pdf", "file", "report"])
    }
}

/// Appends retrieved document contents to a reply as a bulleted list.
/// Returns the reply unchanged when `documents` is empty.
pub fn augment_reply(reply: &str, documents: &[RetrievedDocument]) -> String {
    if documents.is_empty() {
        return reply.to_string();
    }

    let mut augmented = format!("{}\n\n{}\n", reply, AUGMENT_HEADER);
    for doc in documents {
        augmented.push_str("- ");
        augmented.push_str(&doc.content);
        augmented.push('\n');
    }
    augmented
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> RetrievedDocument {
        RetrievedDocument {
            content: content.to_string(),
            similarity_score: 0.9,
        }
    }

    #[test]
    fn test_trigger_terms() {
        let policy = RetrievalPolicy::default();
        assert!(policy.should_retrieve("show me the report"));
        assert!(policy.should_retrieve("What's in the DOCUMENT?"));
        assert!(policy.should_retrieve("summarize this PDF please"));
        assert!(!policy.should_retrieve("hello there"));
    }

    #[test]
    fn test_keywords_are_normalized() {
        let policy = RetrievalPolicy::new(["  Invoice ", "", "   "]);
        assert_eq!(policy.keywords(), ["invoice"]);
        assert!(policy.should_retrieve("find my INVOICES"));
    }

    #[test]
    fn test_empty_policy_never_retrieves() {
        let policy = RetrievalPolicy::new(Vec::<String>::new());
        assert!(!policy.should_retrieve("report document file"));
    }

    #[test]
    fn test_augment_reply_lists_documents() {
        let reply = augment_reply("Here you go.", &[doc("Q1 revenue"), doc("Q2 revenue")]);
        assert_eq!(
            reply,
            "Here you go.\n\nI found some relevant information in the following documents:\n- Q1 revenue\n- Q2 revenue\n"
        );
    }

    #[test]
    fn test_augment_reply_without_documents() {
        assert_eq!(augment_reply("plain", &[]), "plain");
    }
}
