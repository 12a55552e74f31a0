//! HTTP probing for Sitewatch.
//!
//! This crate performs single, bounded health checks against monitored
//! targets and normalizes every outcome into a status value:
//! - website roots are probed with `GET` and reported `online`/`offline`
//! - routes are probed with their own method and JSON body and reported
//!   `success`/`failure` together with the captured response
//!
//! Probes never return errors. Transport failures, timeouts, non-2xx
//! responses and unparsable request bodies all become status values.
//!
//! # Example
//!
//! ```no_run
//! use probe::{HttpProber, ProbeConfig, Prober, SiteState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let prober = HttpProber::new(ProbeConfig::default())?;
//! let state = prober.probe_site("https://example.com/", None).await;
//! assert!(matches!(state, SiteState::Online | SiteState::Offline));
//! # Ok(())
//! # }
//! ```

pub mod join;
pub mod prober;
pub mod types;

pub use join::join_url;
pub use prober::{HttpProber, Prober};
pub use types::{HttpMethod, ProbeConfig, RouteProbe, RouteRequest, RouteState, SiteState};
