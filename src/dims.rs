//! Standard dimensions.
//!
//! Every dataset is indexed by the ordered dimensions of its [`DatasetVariant`]. The first dimension is the time
//! dimension, the one carrying chronological order.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The variant of a dataset, selecting its standard dimensions.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatasetVariant {
    /// Observations or reanalysis indexed by valid time.
    #[default]
    #[display("regular")]
    Regular,
    /// Forecasts indexed by reference time and lead time.
    #[display("forecast")]
    Forecast,
    /// Ensemble forecasts.
    #[display("ensemble")]
    Ensemble,
    /// Ensemble hindcasts (reforecasts).
    #[display("hindcast")]
    Hindcast,
}

impl DatasetVariant {
    /// Select the variant from dataset flags.
    ///
    /// Hindcast takes precedence over ensemble, which takes precedence over forecast.
    #[must_use]
    pub fn from_flags(forecast: bool, ensemble: bool, hindcast: bool) -> Self {
        if hindcast {
            Self::Hindcast
        } else if ensemble {
            Self::Ensemble
        } else if forecast {
            Self::Forecast
        } else {
            Self::Regular
        }
    }

    /// The standard dimensions of the variant.
    #[must_use]
    pub fn standard_dims(&self) -> StandardDims {
        StandardDims(*self)
    }
}

/// The ordered standard dimensions of a [`DatasetVariant`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StandardDims(DatasetVariant);

impl StandardDims {
    /// The dimension names, in order.
    #[must_use]
    pub fn dims(&self) -> &'static [&'static str] {
        match self.0 {
            DatasetVariant::Regular => &["time", "latitude", "longitude"],
            DatasetVariant::Forecast => &["forecast_reference_time", "step", "latitude", "longitude"],
            DatasetVariant::Ensemble => &[
                "forecast_reference_time",
                "step",
                "ensemble",
                "latitude",
                "longitude",
            ],
            DatasetVariant::Hindcast => &[
                "hindcast_reference_time",
                "forecast_reference_offset",
                "step",
                "ensemble",
                "latitude",
                "longitude",
            ],
        }
    }

    /// The time dimension, the first standard dimension.
    #[must_use]
    pub fn time_dim(&self) -> &'static str {
        self.dims()[0]
    }

    /// The variant these dimensions belong to.
    #[must_use]
    pub fn variant(&self) -> DatasetVariant {
        self.0
    }

    /// Returns true if `dims` are exactly the standard dimensions, in order.
    #[must_use]
    pub fn conforms<S: AsRef<str>>(&self, dims: &[S]) -> bool {
        dims.len() == self.dims().len()
            && std::iter::zip(dims, self.dims()).all(|(dim, standard)| dim.as_ref() == *standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_dims() {
        let regular = DatasetVariant::from_flags(false, false, false).standard_dims();
        assert_eq!(regular.dims(), &["time", "latitude", "longitude"]);
        assert_eq!(regular.time_dim(), "time");

        let forecast = DatasetVariant::from_flags(true, false, false).standard_dims();
        assert_eq!(
            forecast.dims(),
            &["forecast_reference_time", "step", "latitude", "longitude"]
        );
        assert_eq!(forecast.time_dim(), "forecast_reference_time");

        let ensemble = DatasetVariant::from_flags(true, true, false).standard_dims();
        assert_eq!(
            ensemble.dims(),
            &["forecast_reference_time", "step", "ensemble", "latitude", "longitude"]
        );
        assert_eq!(ensemble.time_dim(), "forecast_reference_time");

        let hindcast = DatasetVariant::from_flags(true, true, true).standard_dims();
        assert_eq!(
            hindcast.dims(),
            &[
                "hindcast_reference_time",
                "forecast_reference_offset",
                "step",
                "ensemble",
                "latitude",
                "longitude"
            ]
        );
        assert_eq!(hindcast.time_dim(), "hindcast_reference_time");
    }

    #[test]
    fn conformance() {
        let regular = DatasetVariant::Regular.standard_dims();
        assert!(regular.conforms(&["time", "latitude", "longitude"]));
        assert!(!regular.conforms(&["latitude", "time", "longitude"]));
        assert!(!regular.conforms(&["time", "latitude"]));
        assert_eq!(
            serde_json::from_str::<DatasetVariant>(r#""hindcast""#).unwrap(),
            DatasetVariant::Hindcast
        );
    }
}
