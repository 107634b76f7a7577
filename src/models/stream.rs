use futures::Stream;
use serde::{ Serialize, Deserialize };
use std::pin::Pin;

/// One item of a reply stream. An `Error` is always the last item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Error(String),
}

impl Fragment {
    pub fn as_str(&self) -> &str {
        match self {
            Fragment::Text(s) | Fragment::Error(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Fragment::Error(_))
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

/// Newline-delimited JSON record written to chat clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamRecord {
    Token(String),
    Error(String),
}

impl From<Fragment> for StreamRecord {
    fn from(fragment: Fragment) -> Self {
        match fragment {
            Fragment::Text(token) => StreamRecord::Token(token),
            Fragment::Error(message) => StreamRecord::Error(message),
        }
    }
}

impl StreamRecord {
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"error\":\"failed to encode stream record: {}\"}}", e)
        });
        line.push('\n');
        line
    }
}
