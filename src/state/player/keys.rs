//! Enumerated keys used by the player's value maps (currencies, stats,
//! statistics, settings).
//!
//! Keys travel as `SCREAMING_SNAKE_CASE` strings both on the wire and in
//! stored records. Serde rejects any key that names no variant.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! player_keys {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $key:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            ToSchema,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[doc = concat!("`", $key, "`")]
                #[serde(rename = $key)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }
    };
}

player_keys! {
    /// Spendable balances held by a player.
    CurrencyType {
        Gold => "GOLD",
    }
}

player_keys! {
    /// Progression counters shown in game.
    StatType {
        Level => "LEVEL",
        Experience => "EXPERIENCE",
    }
}

player_keys! {
    /// Lifetime counters consumed by leaderboards and analytics.
    StatisticType {
        GamePlayed => "GAME_PLAYED",
        RoundPlayed => "ROUND_PLAYED",
        Playtime => "PLAYTIME",
        GamePlaytime => "GAME_PLAYTIME",
        Win => "WIN",
        Lose => "LOSE",
        RobuxSpent => "ROBUX_SPENT",
        Donate => "DONATE",
        GoldEarned => "GOLD_EARNED",
        PremiumChestOpened => "PREMIUM_CHEST_OPENED",
        PremiumEggOpened => "PREMIUM_EGG_OPENED",
        BasicChestOpened => "BASIC_CHEST_OPENED",
        BasicEggOpened => "BASIC_EGG_OPENED",
    }
}

player_keys! {
    /// Client preferences persisted per player.
    SettingType {
        Speaker => "SPEAKER",
        Sfx => "SFX",
        Music => "MUSIC",
        AutoAccept => "AUTO_ACCEPT",
    }
}

impl SettingType {
    /// Value reported when the player never changed the setting.
    pub fn default_value(self) -> i32 {
        match self {
            SettingType::Speaker | SettingType::Sfx | SettingType::Music => 1,
            SettingType::AutoAccept => 0,
        }
    }
}
