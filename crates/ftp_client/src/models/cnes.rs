use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

use crate::errors::FtpClientError;
use crate::models::request::TransferRequest;

/// Directory holding the monthly CNES database dumps
pub const CNES_DIR: &str = "/cnes/";

/// Month of a CNES database dump, written as `YYYYMM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CnesPeriod {
    year: i32,
    month: u32,
}

impl CnesPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, FtpClientError> {
        if !(1000..=9999).contains(&year) {
            return Err(FtpClientError::InvalidPeriod(format!("year {} is not four digits", year)));
        }
        if !(1..=12).contains(&month) {
            return Err(FtpClientError::InvalidPeriod(format!("month {} is out of range", month)));
        }
        Ok(Self { year, month })
    }

    /// Month of the local clock
    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The month before this one
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Remote file name of the dump for this month
    pub fn file_name(&self) -> String {
        format!("BASE_DE_DADOS_CNES_{}.ZIP", self)
    }
}

impl fmt::Display for CnesPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for CnesPeriod {
    type Err = FtpClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(FtpClientError::InvalidPeriod(format!("{:?} is not YYYYMM", s)));
        }
        let year = s[..4]
            .parse()
            .map_err(|_| FtpClientError::InvalidPeriod(s.to_string()))?;
        let month = s[4..]
            .parse()
            .map_err(|_| FtpClientError::InvalidPeriod(s.to_string()))?;
        Self::new(year, month)
    }
}

/// Request for the CNES dump of `period`
pub fn cnes_request(period: CnesPeriod) -> TransferRequest {
    TransferRequest::new(period.file_name()).in_dir(CNES_DIR)
}
