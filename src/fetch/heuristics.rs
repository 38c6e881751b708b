//! Content heuristics: JS application shells and paywalled pages

use scraper::{Html, Node, Selector};

/// Window, in bytes of lower-cased text, within which two paywall signals
/// must co-occur.
pub const PAYWALL_PROXIMITY_WINDOW: usize = 600;

/// Textual signals that suggest a login or paywall interstitial.
const PAYWALL_SIGNALS: [&str; 4] = ["sign in", "log in", "subscribe", "create account"];

/// Markers for a password input field, checked on the raw markup.
const PASSWORD_MARKERS: [&str; 3] = [
    "type=\"password\"",
    "type='password'",
    "type=password",
];

/// Detect a near-empty client-side app shell.
///
/// A shell is a body shorter than `max_len` bytes containing exactly one
/// element with id `root` or `app`, and fewer than `max_text_nodes`
/// non-whitespace text nodes outside that element.
#[must_use]
pub fn is_js_shell(html: &str, max_len: usize, max_text_nodes: usize) -> bool {
    if html.len() >= max_len {
        return false;
    }

    let doc = Html::parse_document(html);
    let Ok(shell_sel) = Selector::parse("#root, #app") else {
        return false;
    };

    let mut shells = doc.select(&shell_sel);
    let Some(shell) = shells.next() else {
        return false;
    };
    if shells.next().is_some() {
        return false;
    }
    let shell_id = shell.id();

    let outside_text_nodes = doc
        .tree
        .root()
        .descendants()
        .filter(|node| match node.value() {
            Node::Text(text) => !text.trim().is_empty(),
            _ => false,
        })
        .filter(|node| !node.ancestors().any(|a| a.id() == shell_id))
        .count();

    outside_text_nodes < max_text_nodes
}

/// Detect a login wall on a success-status body.
///
/// Two distinct signals out of the sign-in/subscribe vocabulary (a password
/// input counts as one) must occur within [`PAYWALL_PROXIMITY_WINDOW`] bytes
/// of each other in the lower-cased document.
#[must_use]
pub fn looks_paywalled(decoded_body: &str) -> bool {
    let lowered = decoded_body.to_lowercase();

    // (byte offset, signal ordinal) for every occurrence of every signal
    let mut hits: Vec<(usize, usize)> = Vec::new();
    for (ordinal, signal) in PAYWALL_SIGNALS.iter().enumerate() {
        let mut from = 0;
        while let Some(pos) = lowered[from..].find(signal) {
            hits.push((from + pos, ordinal));
            from += pos + signal.len();
        }
    }
    let password_ordinal = PAYWALL_SIGNALS.len();
    for marker in PASSWORD_MARKERS {
        if let Some(pos) = lowered.find(marker) {
            hits.push((pos, password_ordinal));
            break;
        }
    }

    hits.sort_unstable();
    hits.windows(2).any(|pair| {
        let (a_pos, a_sig) = pair[0];
        let (b_pos, b_sig) = pair[1];
        a_sig != b_sig && b_pos - a_pos <= PAYWALL_PROXIMITY_WINDOW
    })
}
