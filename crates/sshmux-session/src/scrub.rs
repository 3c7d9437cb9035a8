//! Control-sequence scrubber for cooked transcript text.
//!
//! A single streaming filter with enumerated rules. Removed: BEL, cursor
//! movement CSI sequences, line/screen clears, private-mode toggles (which
//! covers bracketed paste and the alternate screen buffer), OSC sequences,
//! and bare CR not followed by LF. Everything else — notably SGR color —
//! passes through untouched. Synthesized prompt+echo strings take the raw
//! transcript path and never reach this filter.

/// Scrub `input` for cooked storage.
pub fn scrub(input: &str) -> String {
    strip_artifacts(&strip_sequences(input))
}

/// Remove the enumerated escape sequences and control characters.
fn strip_sequences(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // BEL
            '\x07' => i += 1,

            // Bare CR (not followed by LF) is dropped; CRLF passes through.
            '\r' => {
                if chars.get(i + 1) == Some(&'\n') {
                    out.push_str("\r\n");
                    i += 2;
                } else {
                    i += 1;
                }
            }

            '\x1b' => match chars.get(i + 1) {
                // CSI: ESC [ params/intermediates, final byte in 0x40..=0x7e.
                Some('[') => {
                    let private = chars.get(i + 2) == Some(&'?');
                    let mut j = i + 2;
                    while j < chars.len() && !('\x40'..='\x7e').contains(&chars[j]) {
                        j += 1;
                    }
                    if j >= chars.len() {
                        // Truncated sequence at end of chunk: drop it.
                        break;
                    }
                    let final_byte = chars[j];
                    let drop = matches!(final_byte, 'A'..='H' | 'f' | 'J' | 'K')
                        || (private && matches!(final_byte, 'h' | 'l'));
                    if !drop {
                        out.extend(&chars[i..=j]);
                    }
                    i = j + 1;
                }

                // OSC: ESC ] ... terminated by BEL or ST (ESC \).
                Some(']') => {
                    let mut j = i + 2;
                    loop {
                        match chars.get(j) {
                            Some('\x07') => {
                                j += 1;
                                break;
                            }
                            Some('\x1b') if chars.get(j + 1) == Some(&'\\') => {
                                j += 2;
                                break;
                            }
                            Some(_) => j += 1,
                            None => break,
                        }
                    }
                    i = j;
                }

                // Lone ESC: drop the ESC itself, keep what follows.
                _ => i += 1,
            },

            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Remove shell-setup residue that leaks into exec output.
fn strip_artifacts(input: &str) -> String {
    let mut out = input.replace("null 2>&1", "");
    while let Some(start) = out.find("export PS1='") {
        let body = start + "export PS1='".len();
        match out[body..].find('\'') {
            Some(close) => out.replace_range(start..body + close + 1, ""),
            None => {
                out.truncate(start);
                break;
            }
        }
    }
    out
}
