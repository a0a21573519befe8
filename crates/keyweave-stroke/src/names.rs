//! Tk keysym names for punctuation.
//!
//! Shortcut files may spell punctuation either literally (`"!"`) or by
//! its keysym name (`"exclam"`). The canonical stroke always uses the
//! literal character.

const PUNCTUATION: &[(char, &str)] = &[
    ('&', "ampersand"),
    ('^', "asciicircum"),
    ('~', "asciitilde"),
    ('*', "asterisk"),
    ('@', "at"),
    ('\\', "backslash"),
    ('|', "bar"),
    ('{', "braceleft"),
    ('}', "braceright"),
    ('[', "bracketleft"),
    (']', "bracketright"),
    (':', "colon"),
    (',', "comma"),
    ('$', "dollar"),
    ('=', "equal"),
    ('!', "exclam"),
    ('>', "greater"),
    ('<', "less"),
    ('-', "minus"),
    ('#', "numbersign"),
    ('"', "quotedbl"),
    ('\'', "quoteright"),
    ('(', "parenleft"),
    (')', "parenright"),
    ('%', "percent"),
    ('.', "period"),
    ('+', "plus"),
    ('?', "question"),
    ('`', "quoteleft"),
    (';', "semicolon"),
    ('/', "slash"),
    (' ', "space"),
    ('_', "underscore"),
];

/// Returns the character named by a keysym such as `"exclam"`.
///
/// Names are matched case-insensitively.
pub fn char_for_name(name: &str) -> Option<char> {
    PUNCTUATION
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(c, _)| *c)
}

/// Returns the keysym name of a punctuation character.
pub fn name_for_char(ch: char) -> Option<&'static str> {
    PUNCTUATION.iter().find(|(c, _)| *c == ch).map(|(_, n)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_bidirectional() {
        for (ch, name) in PUNCTUATION {
            assert_eq!(char_for_name(name), Some(*ch));
            assert_eq!(name_for_char(*ch), Some(*name));
        }
    }

    #[test]
    fn test_name_lookup_ignores_case() {
        assert_eq!(char_for_name("Exclam"), Some('!'));
        assert_eq!(char_for_name("BRACELEFT"), Some('{'));
        assert_eq!(char_for_name("bang"), None);
    }
}
