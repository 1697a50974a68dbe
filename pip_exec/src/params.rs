//! # PipBot Executable Parameters
//!
//! This module provides parameters for the pip executable, loaded from `pip_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{liquid_ctrl, motion_ctrl, transfer};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipExecParams {
    /// Path to the controller's serial device
    pub device: String,

    /// Baud rate of the serial link
    pub baud: u32,

    /// Number of tips already used from the tip rack
    pub tip_start: usize,

    /// Name of the layout parameter file
    pub layout_file: String,

    pub motion: motion_ctrl::Params,

    pub liquid: liquid_ctrl::Params,

    pub transfer: transfer::Params,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PipExecParams {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud: 115200,
            tip_start: 0,
            layout_file: "layout.toml".to_string(),
            motion: motion_ctrl::Params::default(),
            liquid: liquid_ctrl::Params::default(),
            transfer: transfer::Params::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_params() {
        let params: PipExecParams = util::params::from_str(
            r#"
            device = "/dev/cu.usbserial-1120"
            tip_start = 12

            [liquid]
            cushion = 50.0

            [motion]
            home_timeout_s = 30.0
            "#,
        )
        .unwrap();

        assert_eq!(params.device, "/dev/cu.usbserial-1120");
        assert_eq!(params.baud, 115200);
        assert_eq!(params.tip_start, 12);
        assert_eq!(params.liquid.cushion, 50.0);
        assert_eq!(params.liquid.settle_ms, 500);
        assert_eq!(params.motion.home_timeout_s, Some(30.0));
        assert_eq!(params.motion.feed_rate, 500.0);
        assert_eq!(params.transfer, transfer::Params::default());
    }

    #[test]
    fn test_workspace_params() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("..");

        let params: PipExecParams =
            util::params::load_from_path(root.join("params/pip_exec.toml")).unwrap();
        assert_eq!(params, PipExecParams::default());

        let layout: crate::layout::LayoutParams =
            util::params::load_from_path(root.join("params").join(&params.layout_file)).unwrap();
        assert_eq!(layout, crate::layout::LayoutParams::default());

        let recipe = comms_if::tc::transfer::Recipe::load(root.join("recipes/dilution.json")).unwrap();
        for req in &recipe.transfers {
            assert!(layout.build().position(&req.source).is_ok());
            assert!(layout.build().position(&req.dest).is_ok());
        }
    }
}
