use std::fmt;

/// Terminal outcome of a request.
///
/// These are the three rows seeded into the `status` table. A request that
/// has not been finalized yet carries no status at all, see
/// [`RequestRecord::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Disconnected,
    Ok,
    Error,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [
        RequestStatus::Disconnected,
        RequestStatus::Ok,
        RequestStatus::Error,
    ];

    pub fn code(self) -> i64 {
        match self {
            RequestStatus::Disconnected => 0,
            RequestStatus::Ok => 1,
            RequestStatus::Error => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RequestStatus::Disconnected),
            1 => Some(RequestStatus::Ok),
            2 => Some(RequestStatus::Error),
            _ => None,
        }
    }

    /// Description stored alongside the code in the `status` table.
    pub fn description(self) -> &'static str {
        match self {
            RequestStatus::Disconnected => "User disconnect",
            RequestStatus::Ok => "Ok",
            RequestStatus::Error => "Error",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One issued instruction as persisted in the `requests` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub id: i64,
    pub client_address: String,
    pub port: u16,
    pub direction: u8,
    pub magnitude: i64,
    /// `None` while the request is pending.
    pub status: Option<RequestStatus>,
}

impl RequestRecord {
    pub const PENDING_LABEL: &'static str = "Pending";

    pub fn is_pending(&self) -> bool {
        self.status.is_none()
    }

    /// Renders the human readable summary used by the activity log.
    ///
    /// `status_label` is the description resolved from the `status` table,
    /// so the text always reflects the stored reference data.
    pub fn summary(&self, status_label: &str) -> String {
        format!(
            "Request ID: {}:\nUser IP: {}, Port: {},\nSwipe Direction: {}, Swipe Distance: {},\nRequest Status: {}",
            self.id, self.client_address, self.port, self.direction, self.magnitude, status_label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(RequestStatus::from_code(3), None);
        assert_eq!(RequestStatus::from_code(-1), None);
    }

    #[test]
    fn test_summary_format() {
        let record = RequestRecord {
            id: 7,
            client_address: "10.0.0.4".into(),
            port: 8080,
            direction: 1,
            magnitude: 321,
            status: Some(RequestStatus::Ok),
        };
        assert_eq!(
            record.summary("Ok"),
            "Request ID: 7:\nUser IP: 10.0.0.4, Port: 8080,\nSwipe Direction: 1, Swipe Distance: 321,\nRequest Status: Ok"
        );
        assert!(!record.is_pending());
    }
}
