//! Compiled-in parameter presets.
//!
//! The upstream preset table and the upstream preset-count constant disagree
//! (fourteen rows against a compile-time assertion of seven); this crate's
//! on-disk `preset` field is `u8, 0..=6`, so the table here is trimmed to
//! seven rows spanning all three coefficient-order tiers with increasing
//! analysis cost, preset 6 being the highest quality.

/// How a stereo pair's channel-decorrelation mode is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProcessMethodTactics {
    /// Never decorrelate; always encode channels independently.
    None,
    /// Always use mid/side.
    MsFixed,
    /// Evaluate LR/MS/LS/SR and keep the cheapest.
    Adaptive,
}

/// How the LPC coefficient order is chosen for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpcOrderDecisionTactics {
    /// Always use the preset's maximum order.
    MaxFixed,
    /// Evaluate every order by actually filtering the signal.
    BruteforceSearch,
    /// Evaluate every order from the Levinson-Durbin error-variance chain.
    BruteforceEstimation,
}

/// A single compiled-in quality/speed tradeoff point.
#[derive(Debug, Clone, Copy)]
pub struct ParameterPreset {
    /// Maximum LPC coefficient order this preset will select.
    pub max_num_parameters: u8,
    /// Channel-decorrelation tactic.
    pub ch_process_method_tactics: ChannelProcessMethodTactics,
    /// LPC order-selection tactic.
    pub lpc_order_tactics: LpcOrderDecisionTactics,
    /// Number of SVR refinement iterations (0 disables SVR).
    pub svr_max_num_iterations: u32,
    /// Soft-threshold margins tried by the SVR estimator, in ascending order.
    pub margin_list: &'static [f64],
}

const MARGIN_LIST: &[f64] = &[0.0, 1.0 / 4096.0, 1.0 / 1024.0, 1.0 / 256.0, 1.0 / 64.0, 1.0 / 16.0];

/// The seven compiled-in presets, indexed by the on-disk `preset` byte.
pub const PRESETS: [ParameterPreset; crate::constants::NUM_PARAMETER_PRESETS] = [
    ParameterPreset {
        max_num_parameters: 32,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::MaxFixed,
        svr_max_num_iterations: 0,
        margin_list: MARGIN_LIST,
    },
    ParameterPreset {
        max_num_parameters: 32,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::MaxFixed,
        svr_max_num_iterations: 10,
        margin_list: MARGIN_LIST,
    },
    ParameterPreset {
        max_num_parameters: 32,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::BruteforceEstimation,
        svr_max_num_iterations: 10,
        margin_list: MARGIN_LIST,
    },
    ParameterPreset {
        max_num_parameters: 64,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::MaxFixed,
        svr_max_num_iterations: 10,
        margin_list: MARGIN_LIST,
    },
    ParameterPreset {
        max_num_parameters: 64,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::BruteforceEstimation,
        svr_max_num_iterations: 10,
        margin_list: MARGIN_LIST,
    },
    ParameterPreset {
        max_num_parameters: 128,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::MaxFixed,
        svr_max_num_iterations: 10,
        margin_list: MARGIN_LIST,
    },
    ParameterPreset {
        max_num_parameters: 128,
        ch_process_method_tactics: ChannelProcessMethodTactics::Adaptive,
        lpc_order_tactics: LpcOrderDecisionTactics::BruteforceEstimation,
        svr_max_num_iterations: 10,
        margin_list: MARGIN_LIST,
    },
];

/// Looks up a preset by its on-disk index, validating the range.
pub fn preset_for(index: u8) -> crate::Result<&'static ParameterPreset> {
    PRESETS
        .get(index as usize)
        .ok_or(crate::errors::Error::InvalidFormat("preset index out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_use_adaptive_tactics() {
        for p in PRESETS.iter() {
            assert_eq!(p.ch_process_method_tactics, ChannelProcessMethodTactics::Adaptive);
        }
    }

    #[test]
    fn preset_six_is_highest_quality() {
        assert_eq!(PRESETS[6].max_num_parameters, 128);
        assert_eq!(PRESETS[6].lpc_order_tactics, LpcOrderDecisionTactics::BruteforceEstimation);
    }

    #[test]
    fn out_of_range_preset_is_rejected() {
        assert!(preset_for(7).is_err());
    }
}
