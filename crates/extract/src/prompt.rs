pub fn build_extraction_prompt(text: &str) -> String {
    format!(
        "Extract structured data from the following text. If information is missing, infer reasonable defaults when appropriate:\n\n{}",
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_text() {
        let prompt = build_extraction_prompt("Lemonade by Beyoncé");
        assert!(prompt.starts_with("Extract structured data"));
        assert!(prompt.ends_with("\n\nLemonade by Beyoncé"));
    }
}
