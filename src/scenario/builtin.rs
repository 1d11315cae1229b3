//! The two checks shipped with the harness, written against the page
//! contract of the Flagged game UI.

use std::path::PathBuf;

use serde_json as json;
use url::Url;

use crate::scenario::{Scenario, Step};
use crate::session::Selector;
use crate::wait::Timeout;

pub const LOBBY: &str = "lobby";
pub const SPINNER: &str = "spinner";

/// Global the game reads to decide which side of the match this client is.
const PLAYER_ONE_FLAG: &str = "amIPlayer1";

const SPINNER_SEGMENTS: usize = 12;

const HIDE_SPINNER_MODAL: &str =
    "document.getElementById('spinner-modal').style.display = 'none'";

/// Holds once the page finished loading and its game entry points exist.
pub const GAME_READY: &str = "document.readyState === 'complete' \
                              && typeof startSpinner === 'function' \
                              && typeof setLoading === 'function'";

/// Header and initial message render on a fresh load.
pub fn lobby(target: &Url) -> Scenario {
    Scenario::new(
        LOBBY,
        vec![
            Step::Navigate {
                url: target.clone(),
            },
            Step::WaitForVisible {
                selector: Selector::new("h1"),
                timeout: Some(Timeout::from_secs(10)),
            },
            Step::AssertText {
                selector: Selector::new("h1"),
                text: "Flagged".to_string(),
            },
            Step::WaitForVisible {
                selector: Selector::new("#initial-message"),
                timeout: None,
            },
            Step::Screenshot {
                path: PathBuf::from("verification.png"),
            },
        ],
    )
}

/// First-turn minigame spinner, then the non-interactive loading overlay.
pub fn spinner(target: &Url) -> Scenario {
    let modal = Selector::new("#spinner-modal");
    Scenario::new(
        SPINNER,
        vec![
            Step::Navigate {
                url: target.clone(),
            },
            Step::WaitForFunction {
                expression: GAME_READY.to_string(),
                timeout: Some(Timeout::from_secs(10)),
            },
            Step::InjectGlobal {
                name: PLAYER_ONE_FLAG.to_string(),
                value: json::Value::Bool(true),
            },
            Step::Evaluate {
                script: "startSpinner('scenes', null)".to_string(),
            },
            Step::WaitForVisible {
                selector: modal.clone(),
                timeout: None,
            },
            Step::WaitForCount {
                selector: Selector::new(".spinner-segment").within(&modal),
                count: SPINNER_SEGMENTS,
                timeout: Some(Timeout::from_secs(5)),
            },
            // The wheel animates in after its segments exist and exposes no
            // signal for when it settles.
            Step::WaitFixed {
                duration: Timeout(1_000),
            },
            Step::Screenshot {
                path: PathBuf::from("verification.png"),
            },
            Step::Evaluate {
                script: HIDE_SPINNER_MODAL.to_string(),
            },
            Step::Evaluate {
                script: "setLoading(true, false)".to_string(),
            },
            Step::WaitForVisible {
                selector: Selector::new("#interstitial-screen"),
                timeout: None,
            },
            Step::WaitForVisible {
                selector: Selector::new("#interstitial-spinner-wheel"),
                timeout: None,
            },
            Step::Screenshot {
                path: PathBuf::from("loading_spinner.png"),
            },
        ],
    )
}

pub fn by_name(name: &str, target: &Url) -> Option<Scenario> {
    match name {
        LOBBY => Some(lobby(target)),
        SPINNER => Some(spinner(target)),
        _ => None,
    }
}
