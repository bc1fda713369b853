use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Navigation command carried by a report control, encoded as
/// `top:<correlation-id>:<page>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavCommand {
    pub correlation_id: Uuid,
    pub page: usize,
}

const OP_TOP: &str = "top";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload has no operation tag")]
    Empty,
    #[error("unknown operation `{0}`")]
    UnknownOp(String),
    #[error("invalid correlation id `{0}`")]
    CorrelationId(String),
    #[error("invalid page index `{0}`")]
    Page(String),
}

impl NavCommand {
    pub fn new(correlation_id: Uuid, page: usize) -> Self {
        Self { correlation_id, page }
    }
}

impl fmt::Display for NavCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", OP_TOP, self.correlation_id, self.page)
    }
}

impl FromStr for NavCommand {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let op = parts.next().filter(|p| !p.is_empty()).ok_or(PayloadError::Empty)?;
        if op != OP_TOP {
            return Err(PayloadError::UnknownOp(op.to_string()));
        }
        let id = parts.next().unwrap_or_default();
        let correlation_id =
            Uuid::parse_str(id).map_err(|_| PayloadError::CorrelationId(id.to_string()))?;
        let page = parts.next().unwrap_or_default();
        let page = page
            .parse::<usize>()
            .map_err(|_| PayloadError::Page(page.to_string()))?;
        Ok(Self { correlation_id, page })
    }
}
