// Load and RGB load kinds.

use std::future::Future;

use tracing::debug;

use vantage_api::command::Param;
use vantage_api::{CommandClient, Error as ApiError, ObjectRecord, StatusCategory, Vid};

use super::{
    decode_decimal, decode_fixed, decode_int, set_field, unknown_method, ObjectInfo, ObjectKind,
    VantageObject,
};
use crate::error::Error;

// ── Load ─────────────────────────────────────────────────────────────

/// Mutable state owned by the `Load` interface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadState {
    /// Level as a percentage (0-100). Unset until first fetched.
    pub level: Option<f64>,
}

/// A dimmer, relay, or motor load.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub info: ObjectInfo,
    pub load_type: String,
    pub power_profile: Option<Vid>,
    pub state: LoadState,
}

impl Load {
    pub fn level(&self) -> Option<f64> {
        self.state.level
    }

    pub fn is_on(&self) -> bool {
        self.state.level.is_some_and(|level| level > 0.0)
    }

    pub fn is_relay(&self) -> bool {
        matches!(
            self.load_type.as_str(),
            "High Voltage Relay" | "Low Voltage Relay"
        )
    }

    pub fn is_motor(&self) -> bool {
        self.load_type == "Motor"
    }

    pub fn is_light(&self) -> bool {
        !(self.is_relay() || self.is_motor())
    }
}

impl VantageObject for Load {
    const KIND: ObjectKind = ObjectKind::Load;

    fn wire_types() -> &'static [&'static str] {
        &["Load"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            load_type: record.property("LoadType").unwrap_or_default().to_string(),
            power_profile: record.property_vid("PowerProfile"),
            state: LoadState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info
            || self.load_type != other.load_type
            || self.power_profile != other.power_profile;
        self.info = other.info.clone();
        self.load_type = other.load_type.clone();
        self.power_profile = other.power_profile;
        changed
    }

    fn state_methods() -> &'static [&'static str] {
        &["Load.GetLevel"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Load]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Load.GetLevel" | "Load.GetLevelHW" => {
                set_field(&mut self.state.level, decode_fixed(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            // S:LOAD <vid> <level (0-100)>
            ("LOAD", Some(level)) => set_field(&mut self.state.level, decode_decimal(level)),
            _ => false,
        }
    }
}

// ── RgbLoad ──────────────────────────────────────────────────────────

/// Mutable state owned by the `Load`, `RGBLoad`, and `ColorTemperature`
/// interfaces.
///
/// `RGBLoad.GetRGB`/`GetHSL` report one channel per call, so the tuple
/// fields are assembled from per-channel buffers and stay `None` until
/// every channel has been seen at least once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbLoadState {
    pub level: Option<f64>,
    pub rgb: Option<(u8, u8, u8)>,
    pub hsl: Option<(u16, u8, u8)>,
    /// Color temperature in Kelvin.
    pub color_temp: Option<u32>,
    /// Per-channel assembly buffers for `rgb` (R, G, B).
    rgb_channels: [Option<u8>; 3],
    /// Per-channel assembly buffers for `hsl` (H, S, L).
    hsl_channels: [Option<u16>; 3],
}

impl RgbLoadState {
    fn store_rgb_channel(&mut self, channel: usize, value: i64) -> bool {
        self.rgb_channels[channel] = Some(value.clamp(0, 255) as u8);
        let assembled = match self.rgb_channels {
            [Some(r), Some(g), Some(b)] => Some((r, g, b)),
            _ => None,
        };
        set_field(&mut self.rgb, assembled)
    }

    fn store_hsl_channel(&mut self, channel: usize, value: i64) -> bool {
        // Channel 0 is hue (0-360); 1 and 2 are percentages.
        let cap = if channel == 0 { 360 } else { 100 };
        self.hsl_channels[channel] = Some(value.clamp(0, cap) as u16);
        let assembled = match self.hsl_channels {
            [Some(h), Some(s), Some(l)] => Some((h, s as u8, l as u8)),
            _ => None,
        };
        set_field(&mut self.hsl, assembled)
    }
}

/// A color-capable load.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbLoad {
    pub info: ObjectInfo,
    pub state: RgbLoadState,
}

impl RgbLoad {
    pub fn level(&self) -> Option<f64> {
        self.state.level
    }

    pub fn is_on(&self) -> bool {
        self.state.level.is_some_and(|level| level > 0.0)
    }
}

impl VantageObject for RgbLoad {
    const KIND: ObjectKind = ObjectKind::RgbLoad;

    fn wire_types() -> &'static [&'static str] {
        &["Vantage.DGColorLoad", "Vantage.DDGColorLoad"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: RgbLoadState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info;
        self.info = other.info.clone();
        changed
    }

    fn state_methods() -> &'static [&'static str] {
        &[
            "Load.GetLevel",
            "RGBLoad.GetRGB",
            "RGBLoad.GetHSL",
            "ColorTemperature.Get",
        ]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Load]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, args: &[String]) -> bool {
        match method {
            "Load.GetLevel" | "Load.GetLevelHW" => {
                set_field(&mut self.state.level, decode_fixed(result))
            }
            // One channel per message:
            // R:INVOKE <vid> <value> RGBLoad.GetRGB <channel>
            // S:STATUS <vid> RGBLoad.GetRGB <value> <channel>
            "RGBLoad.GetRGB" | "RGBLoad.GetRGBHW" => {
                match (decode_int(result), channel_arg(args)) {
                    (Some(value), Some(channel)) => self.state.store_rgb_channel(channel, value),
                    _ => false,
                }
            }
            "RGBLoad.GetHSL" | "RGBLoad.GetHSLHW" => {
                match (decode_int(result), channel_arg(args)) {
                    (Some(value), Some(channel)) => self.state.store_hsl_channel(channel, value),
                    _ => false,
                }
            }
            "ColorTemperature.Get" => set_field(
                &mut self.state.color_temp,
                decode_int(result).map(|k| k as u32),
            ),
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            ("LOAD", Some(level)) => set_field(&mut self.state.level, decode_decimal(level)),
            _ => false,
        }
    }

    /// The color getters take a channel argument, so the default
    /// zero-argument fetch does not apply: issue one call per channel
    /// and let the status binding assemble the tuples.
    fn fetch_state(
        &mut self,
        client: &CommandClient,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        async move {
            let vid = self.info.vid;

            let mut calls: Vec<(&'static str, Vec<Param>)> =
                vec![("Load.GetLevel", Vec::new())];
            for channel in 0..3i64 {
                calls.push(("RGBLoad.GetRGB", vec![Param::Int(channel)]));
                calls.push(("RGBLoad.GetHSL", vec![Param::Int(channel)]));
            }
            calls.push(("ColorTemperature.Get", Vec::new()));

            let mut changed = false;
            for (method, params) in calls {
                match client.invoke(vid, method, &params).await {
                    Ok(response) => {
                        changed |=
                            self.apply_object_status(method, &response.result, &response.args);
                    }
                    Err(ApiError::Command { code, message }) => {
                        debug!(vid, method, code = code.code(), message = %message, "state fetch skipped");
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            Ok(changed)
        }
    }
}

/// The channel index trailing a per-channel color message.
fn channel_arg(args: &[String]) -> Option<usize> {
    match args.first().and_then(|a| decode_int(a)) {
        Some(channel @ 0..=2) => Some(channel as usize),
        _ => None,
    }
}
