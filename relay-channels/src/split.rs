//! Splitting long replies into platform-sized messages.
//!
//! Lengths are counted in `char`s, so a chunk never ends inside a UTF-8
//! sequence.

/// Split `text` into chunks of at most `max_len` characters.
///
/// Prefers the last newline, then the last space, at or before `max_len`, as
/// long as that break is not in the first half of the window. Otherwise the
/// text is cut hard at `max_len`. Whitespace at the start of each following
/// chunk is dropped, and trailing whitespace never produces an empty chunk.
///
/// ```
/// use relay_channels::split::split_message;
///
/// assert_eq!(
///     split_message("hello world foobarbaz", 10),
///     vec!["hello", "world", "foobarbaz"]
/// );
/// ```
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);

    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        if remaining.chars().count() <= max_len {
            if !remaining.is_empty() || chunks.is_empty() {
                chunks.push(remaining.to_string());
            }
            break;
        }

        let split_at = split_point(remaining, max_len);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Byte offset to cut at. `text` must be longer than `max_len` chars.
fn split_point(text: &str, max_len: usize) -> usize {
    // Byte offset of char `max_len`, the hard cut.
    let hard_cut = byte_offset(text, max_len);
    // The window includes char `max_len` itself, so a separator sitting right
    // after a full-length chunk still counts.
    let window_end = byte_offset(text, max_len + 1);
    let window = &text[..window_end];
    let min_pos = max_len / 2;

    for separator in ['\n', ' '] {
        if let Some(idx) = window.rfind(separator) {
            let pos = window[..idx].chars().count();
            if pos > 0 && pos >= min_pos {
                return idx;
            }
        }
    }

    hard_cut
}

fn byte_offset(text: &str, char_pos: usize) -> usize {
    text.char_indices()
        .nth(char_pos)
        .map_or(text.len(), |(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn split_message_short() {
        assert_eq!(split_message("Hello, World!", 4096), vec!["Hello, World!"]);
    }

    #[test]
    fn split_message_exact_length() {
        let msg = "x".repeat(10);
        assert_eq!(split_message(&msg, 10), vec![msg]);
    }

    #[test]
    fn split_message_empty() {
        assert_eq!(split_message("", 10), vec![""]);
    }

    #[test]
    fn split_message_words() {
        assert_eq!(
            split_message("hello world foobarbaz", 10),
            vec!["hello", "world", "foobarbaz"]
        );
    }

    #[test]
    fn split_message_hard_cut() {
        let msg = "x".repeat(25);
        assert_eq!(
            split_message(&msg, 10),
            vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]
        );
    }

    #[test]
    fn split_message_long() {
        let msg = "x".repeat(5000);
        let result = split_message(&msg, 4096);
        assert_eq!(result.len(), 2);
        assert_eq!(len(&result[0]), 4096);
        assert_eq!(len(&result[1]), 904);
    }

    #[test]
    fn split_message_prefers_newline() {
        assert_eq!(
            split_message("first line\nsecond part here", 15),
            vec!["first line", "second part", "here"]
        );
    }

    #[test]
    fn split_message_ignores_break_in_first_half() {
        // The only space is at position 2, below the midpoint of 5.
        assert_eq!(split_message("ab cdefghijklmn", 10), vec!["ab cdefghi", "jklmn"]);
    }

    #[test]
    fn split_message_separator_at_limit() {
        // Space at char 10 yields a full 10-char first chunk.
        assert_eq!(
            split_message("abcdefghij klm", 10),
            vec!["abcdefghij", "klm"]
        );
    }

    #[test]
    fn split_message_trailing_whitespace() {
        let msg = format!("{}{}", "a".repeat(10), " ".repeat(5));
        assert_eq!(split_message(&msg, 10), vec!["a".repeat(10)]);
    }

    #[test]
    fn split_message_multibyte() {
        let msg = "Привет мир, как дела сегодня";
        let chunks = split_message(msg, 8);
        assert!(chunks.iter().all(|c| len(c) <= 8));
        assert_eq!(chunks[0], "Привет");

        let emoji = "😀".repeat(7);
        assert_eq!(split_message(&emoji, 3), vec!["😀😀😀", "😀😀😀", "😀"]);
    }

    #[test]
    fn split_message_zero_limit_behaves_as_one() {
        assert_eq!(split_message("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_hard_cut_keeps_inner_whitespace() {
        assert_eq!(
            split_message("ab cd\t\tef", 4),
            vec!["ab", "cd\t\t", "ef"]
        );
    }

    /// Walk `text` chunk by chunk. Returns what is left after the last chunk,
    /// or `None` if a chunk is not the next slice of the text.
    fn leftover_after<'a>(text: &'a str, chunks: &[String]) -> Option<&'a str> {
        let mut remaining = text;
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                remaining = remaining.trim_start();
            }
            remaining = remaining.strip_prefix(chunk.as_str())?;
        }
        Some(remaining)
    }

    proptest! {
        #[test]
        fn short_text_is_single_chunk(text in "\\PC{0,40}", extra in 0usize..20) {
            let max_len = len(&text) + extra;
            prop_assume!(max_len > 0);
            prop_assert_eq!(split_message(&text, max_len), vec![text.clone()]);
        }

        #[test]
        fn chunks_respect_limit(text in "[a-z \n]{0,300}", max_len in 1usize..60) {
            for chunk in split_message(&text, max_len) {
                prop_assert!(len(&chunk) <= max_len);
            }
        }

        #[test]
        fn chunks_are_consecutive_slices(
            text in "[a-zé😀 \n\t]{0,300}",
            max_len in 1usize..60,
        ) {
            let chunks = split_message(&text, max_len);
            let leftover = leftover_after(&text, &chunks);
            prop_assert!(leftover.is_some(), "chunks {:?} do not walk {:?}", chunks, text);
            prop_assert!(leftover.unwrap_or_default().trim().is_empty());
        }

        #[test]
        fn no_empty_chunks_for_long_text(text in "[a-z \n]{61,300}", max_len in 1usize..60) {
            for chunk in split_message(&text, max_len) {
                prop_assert!(!chunk.is_empty());
            }
        }

        #[test]
        fn later_chunks_have_no_leading_whitespace(
            text in "[a-z \n]{0,300}",
            max_len in 1usize..60,
        ) {
            for chunk in split_message(&text, max_len).iter().skip(1) {
                prop_assert!(!chunk.starts_with(char::is_whitespace));
            }
        }
    }
}
