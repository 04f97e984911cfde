//! Static map from site code to adapter constructor

use std::fmt;
use std::str::FromStr;

use crate::config::ScraperConfig;
use crate::dates::DateWindow;
use crate::error::ScraperError;
use crate::listing::ListingAdapter;
use crate::sites::{daishin, dynamic, hanaif, hf, kdi, kif, lh, ricon};
use crate::traits::{AdapterCore, SiteAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteCode {
    LhFocus,
    LhInsite,
    Kif,
    Kdi,
    HanaIf,
    Hf,
    Daishin,
    Ricon,
    Dynamic,
}

impl SiteCode {
    pub const ALL: [SiteCode; 9] = [
        SiteCode::LhFocus,
        SiteCode::LhInsite,
        SiteCode::Kif,
        SiteCode::Kdi,
        SiteCode::HanaIf,
        SiteCode::Hf,
        SiteCode::Daishin,
        SiteCode::Ricon,
        SiteCode::Dynamic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SiteCode::LhFocus => "lh-focus",
            SiteCode::LhInsite => "lh-insite",
            SiteCode::Kif => "kif",
            SiteCode::Kdi => "kdi",
            SiteCode::HanaIf => "hanaif",
            SiteCode::Hf => "hf",
            SiteCode::Daishin => "daishin",
            SiteCode::Ricon => "ricon",
            SiteCode::Dynamic => "dynamic",
        }
    }

    /// Value written into each record's `source`.
    pub fn site_name(self) -> &'static str {
        match self {
            SiteCode::LhFocus => lh::LhSeries::Focus.site_name(),
            SiteCode::LhInsite => lh::LhSeries::Insite.site_name(),
            SiteCode::Kif => kif::SITE_NAME,
            SiteCode::Kdi => kdi::SITE_NAME,
            SiteCode::HanaIf => hanaif::SITE_NAME,
            SiteCode::Hf => hf::SITE_NAME,
            SiteCode::Daishin => daishin::SITE_NAME,
            SiteCode::Ricon => ricon::SITE_NAME,
            SiteCode::Dynamic => dynamic::SITE_NAME,
        }
    }
}

impl fmt::Display for SiteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteCode {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        SiteCode::ALL
            .into_iter()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| ScraperError::UnknownSite(s.to_string()))
    }
}

pub fn all() -> &'static [SiteCode] {
    &SiteCode::ALL
}

/// Construct the adapter for `code`.
pub fn build(code: SiteCode, window: DateWindow, config: &ScraperConfig) -> Box<dyn SiteAdapter> {
    let core = AdapterCore::from_config(code.site_name(), window, config);
    let adapter = match code {
        SiteCode::Dynamic => {
            let adapter = dynamic::adapter(core, dynamic::PROFILES);
            let capacity = config.observer_capacity.max(dynamic::OBSERVER_CAPACITY);
            return Box::new(adapter.with_observer_capacity(capacity));
        }
        SiteCode::LhFocus => ListingAdapter::new(core).with_board(lh::LhBoard::new(lh::LhSeries::Focus)),
        SiteCode::LhInsite => ListingAdapter::new(core).with_board(lh::LhBoard::new(lh::LhSeries::Insite)),
        SiteCode::Kif => ListingAdapter::new(core).with_board(kif::KifBoard::default()),
        SiteCode::Kdi => ListingAdapter::new(core)
            .with_board(kdi::MaterialBoard)
            .with_board(kdi::TopicBoard),
        SiteCode::HanaIf => ListingAdapter::new(core)
            .with_board(hanaif::HanaIfBoard::research_reports())
            .with_board(hanaif::HanaIfBoard::focus()),
        SiteCode::Hf => ListingAdapter::new(core).with_board(hf::HfBoard),
        SiteCode::Daishin => ListingAdapter::new(core).with_board(daishin::DaishinBoard),
        SiteCode::Ricon => ListingAdapter::new(core).with_board(ricon::RiconBoard),
    };
    Box::new(adapter.with_observer_capacity(config.observer_capacity))
}
