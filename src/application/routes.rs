//! Public URLs of the site pages a gateway or a mail links to.

use crate::config::ComponentParams;
use crate::domain::project::Project;

/// Step of the backing wizard a link points to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BackingLayout {
    Default,
    Payment,
    Share,
}

impl BackingLayout {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Payment => "payment",
            Self::Share => "share",
        }
    }
}

pub fn details_url(params: &ComponentParams, project: &Project) -> String {
    format!(
        "{}/projects/{}/{}",
        params.site_root(),
        project.catid,
        project.slug()
    )
}

pub fn backing_url(params: &ComponentParams, project: &Project, layout: BackingLayout) -> String {
    format!(
        "{}/backing?layout={}",
        details_url(params, project),
        layout.as_str()
    )
}

pub fn discover_url(params: &ComponentParams) -> String {
    format!("{}/discover", params.site_root())
}

/// Host part of an absolute URL.
pub fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}
