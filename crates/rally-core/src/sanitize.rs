/// Strip markup from free-text fields before they are persisted. Campaign
/// descriptions arrive as rich text; storage only ever holds the text
/// content, so anything between `<` and `>` is dropped wholesale rather
/// than maintaining a tag allowlist.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_markup("save the bees & trees"), "save the bees & trees");
    }

    #[test]
    fn tags_are_stripped() {
        assert_eq!(
            strip_markup("<p>hello <b>world</b></p><script>alert(1)</script>"),
            "hello worldalert(1)"
        );
    }

    #[test]
    fn unterminated_tag_drops_the_tail() {
        assert_eq!(strip_markup("before <img src=x onerror=..."), "before ");
    }
}
