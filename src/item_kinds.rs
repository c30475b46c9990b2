use std::fmt;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;

use crate::types::Difficulty;

/// The closed set of item kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Button,
    Password,
    Wires,
}

impl ItemKind {
    #[cfg(test)]
    pub const ALL: [ItemKind; 3] = [ItemKind::Button, ItemKind::Password, ItemKind::Wires];
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Button => "Button",
            ItemKind::Password => "Password",
            ItemKind::Wires => "Wires",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonColor {
    Red,
    Green,
    Blue,
}

impl ButtonColor {
    pub const ALL: [ButtonColor; 3] = [ButtonColor::Red, ButtonColor::Green, ButtonColor::Blue];

    fn ordinal(self) -> usize {
        match self {
            ButtonColor::Red => 0,
            ButtonColor::Green => 1,
            ButtonColor::Blue => 2,
        }
    }
}

impl fmt::Display for ButtonColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonColor::Red => "Red",
            ButtonColor::Green => "Green",
            ButtonColor::Blue => "Blue",
        };
        f.write_str(name)
    }
}

/// Wire palette. Declaration order is the palette order used for tie-breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireColor {
    Red,
    Green,
    Blue,
    Yellow,
    White,
    Black,
}

impl WireColor {
    pub const PALETTE: [WireColor; 6] = [
        WireColor::Red,
        WireColor::Green,
        WireColor::Blue,
        WireColor::Yellow,
        WireColor::White,
        WireColor::Black,
    ];

    pub fn code(self) -> char {
        match self {
            WireColor::Red => 'R',
            WireColor::Green => 'G',
            WireColor::Blue => 'B',
            WireColor::Yellow => 'Y',
            WireColor::White => 'W',
            WireColor::Black => 'K',
        }
    }

    #[cfg(test)]
    pub fn from_code(code: char) -> Option<Self> {
        Self::PALETTE.into_iter().find(|color| color.code() == code)
    }

    fn is_primary(self) -> bool {
        matches!(self, WireColor::Red | WireColor::Green | WireColor::Blue)
    }

    fn palette_index(self) -> usize {
        Self::PALETTE
            .iter()
            .position(|&color| color == self)
            .unwrap_or(0)
    }
}

/// Rule used to pick which wire to cut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireRule {
    /// First red, green, or blue wire; first wire when there is none.
    FirstPrimary,
    /// Last wire when a yellow wire is present, otherwise the first.
    LastIfYellow,
    /// Second wire unless a black wire is present, then the first.
    SecondUnlessBlack,
    /// First position of the most frequent color.
    MostFrequent,
    /// Middle position, `(n + 1) / 2`.
    Middle,
}

impl WireRule {
    pub const ALL: [WireRule; 5] = [
        WireRule::FirstPrimary,
        WireRule::LastIfYellow,
        WireRule::SecondUnlessBlack,
        WireRule::MostFrequent,
        WireRule::Middle,
    ];

    pub fn index(self) -> usize {
        match self {
            WireRule::FirstPrimary => 0,
            WireRule::LastIfYellow => 1,
            WireRule::SecondUnlessBlack => 2,
            WireRule::MostFrequent => 3,
            WireRule::Middle => 4,
        }
    }

    /// 1-based position of the wire to cut.
    pub fn apply(self, wires: &[WireColor]) -> usize {
        let n = wires.len();
        match self {
            WireRule::FirstPrimary => wires
                .iter()
                .position(|wire| wire.is_primary())
                .map_or(1, |idx| idx + 1),
            WireRule::LastIfYellow => {
                if wires.contains(&WireColor::Yellow) {
                    n
                } else {
                    1
                }
            }
            WireRule::SecondUnlessBlack => {
                if wires.contains(&WireColor::Black) {
                    1
                } else {
                    2
                }
            }
            WireRule::MostFrequent => {
                let mut counts = [0usize; WireColor::PALETTE.len()];
                for wire in wires {
                    counts[wire.palette_index()] += 1;
                }
                // Strict comparison keeps the earliest palette color on ties.
                let mut best = 0;
                for idx in 1..counts.len() {
                    if counts[idx] > counts[best] {
                        best = idx;
                    }
                }
                let target = WireColor::PALETTE[best];
                wires
                    .iter()
                    .position(|&wire| wire == target)
                    .map_or(1, |idx| idx + 1)
            }
            WireRule::Middle => (n + 1) / 2,
        }
    }
}

/// Kind-specific data; exactly one variant per kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Button { color: ButtonColor },
    Password { hash: String },
    Wires { wires: Vec<WireColor>, rule: WireRule },
}

#[cfg(test)]
impl Payload {
    pub fn kind(&self) -> ItemKind {
        match self {
            Payload::Button { .. } => ItemKind::Button,
            Payload::Password { .. } => ItemKind::Password,
            Payload::Wires { .. } => ItemKind::Wires,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Button { color } => write!(f, "Button {color}"),
            Payload::Password { hash } => write!(f, "Password Hash: {hash}"),
            Payload::Wires { wires, rule } => {
                f.write_str("Wires /")?;
                for wire in wires {
                    write!(f, "{}/", wire.code())?;
                }
                write!(f, " (Rule {})", rule.index())
            }
        }
    }
}

/// A payload paired with the instruction that defuses it.
///
/// The correct instruction is derived once, here, and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Puzzle {
    pub payload: Payload,
    pub correct: String,
}

impl Puzzle {
    pub fn button(color: ButtonColor) -> Self {
        Self {
            payload: Payload::Button { color },
            correct: "p".repeat(1 + color.ordinal()),
        }
    }

    /// Symbols outside `A..=I` are kept in the hash but contribute no digit.
    pub fn password(hash: impl Into<String>) -> Self {
        let hash = hash.into();
        let correct = hash.chars().filter_map(password_digit).collect();
        Self {
            payload: Payload::Password { hash },
            correct,
        }
    }

    pub fn wires(wires: Vec<WireColor>, rule: WireRule) -> Self {
        let correct = rule.apply(&wires).to_string();
        Self {
            payload: Payload::Wires { wires, rule },
            correct,
        }
    }
}

// A B C     9 5 2
// D E F  -> 6 8 1
// G H I     7 3 4
const PASSWORD_TABLE: [[char; 3]; 3] = [['9', '5', '2'], ['6', '8', '1'], ['7', '3', '4']];
const WIRE_COUNT: usize = 5;

/// Digit for a password symbol, or `None` outside `A..=I`.
pub fn password_digit(symbol: char) -> Option<char> {
    if !('A'..='I').contains(&symbol) {
        return None;
    }
    let offset = symbol as usize - 'A' as usize;
    Some(PASSWORD_TABLE[offset / 3][offset % 3])
}

fn password_len(difficulty: Difficulty, rng: &mut impl Rng) -> usize {
    let base = match difficulty {
        Difficulty::Easy => 3,
        Difficulty::Medium => 4,
        Difficulty::Hard => 5,
    };
    base + rng.gen_range(0..2)
}

/// Generate a fresh puzzle of `kind`.
///
/// Difficulty only changes the password length; buttons and wires are
/// drawn the same way at every level.
pub fn generate(kind: ItemKind, difficulty: Difficulty, rng: &mut impl Rng) -> Puzzle {
    match kind {
        ItemKind::Button => {
            let color = ButtonColor::ALL[rng.gen_range(0..ButtonColor::ALL.len())];
            Puzzle::button(color)
        }
        ItemKind::Password => {
            let len = password_len(difficulty, rng);
            let hash: String = (0..len)
                .map(|_| (b'A' + rng.gen_range(0..9u8)) as char)
                .collect();
            Puzzle::password(hash)
        }
        ItemKind::Wires => {
            let rule = WireRule::ALL[rng.gen_range(0..WireRule::ALL.len())];
            let wires = (0..WIRE_COUNT)
                .map(|_| WireColor::PALETTE[rng.gen_range(0..WireColor::PALETTE.len())])
                .collect();
            Puzzle::wires(wires, rule)
        }
    }
}

/// Byte-exact, case-sensitive comparison against the stored answer.
pub fn validate(puzzle: &Puzzle, submitted: &str) -> bool {
    puzzle.correct.as_bytes() == submitted.as_bytes()
}

/// Relative odds of each kind when the generator creates an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindWeights {
    pub button: u32,
    pub password: u32,
    pub wires: u32,
}

impl KindWeights {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                button: 60,
                password: 30,
                wires: 10,
            },
            Difficulty::Medium => Self {
                button: 35,
                password: 35,
                wires: 30,
            },
            Difficulty::Hard => Self {
                button: 20,
                password: 40,
                wires: 40,
            },
        }
    }

    pub fn button_only() -> Self {
        Self {
            button: 1,
            password: 0,
            wires: 0,
        }
    }

    pub fn pick(&self, rng: &mut impl Rng) -> ItemKind {
        let total = self.button + self.password + self.wires;
        if total == 0 {
            return ItemKind::Button;
        }
        let roll = rng.gen_range(0..total);
        if roll < self.button {
            ItemKind::Button
        } else if roll < self.button + self.password {
            ItemKind::Password
        } else {
            ItemKind::Wires
        }
    }
}

/// Which kinds the generator may draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KindPolicy {
    /// Difficulty-weighted mix of all three kinds.
    #[default]
    Mixed,
    /// Buttons only, like the plain generator path.
    ButtonOnly,
}

impl KindPolicy {
    pub fn weights(self, difficulty: Difficulty) -> KindWeights {
        match self {
            KindPolicy::Mixed => KindWeights::for_difficulty(difficulty),
            KindPolicy::ButtonOnly => KindWeights::button_only(),
        }
    }
}

impl fmt::Display for KindPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindPolicy::Mixed => f.write_str("mixed"),
            KindPolicy::ButtonOnly => f.write_str("button"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kind policy: {0} (expected mixed or button)")]
pub struct ParseKindPolicyError(pub String);

impl FromStr for KindPolicy {
    type Err = ParseKindPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mixed" | "all" => Ok(KindPolicy::Mixed),
            "button" | "buttons" => Ok(KindPolicy::ButtonOnly),
            _ => Err(ParseKindPolicyError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn wires_from(codes: &str) -> Vec<WireColor> {
        codes
            .chars()
            .map(|c| WireColor::from_code(c).expect("valid wire code"))
            .collect()
    }

    #[test]
    fn button_answer_length_follows_color() {
        assert_eq!(Puzzle::button(ButtonColor::Red).correct, "p");
        assert_eq!(Puzzle::button(ButtonColor::Green).correct, "pp");
        assert_eq!(Puzzle::button(ButtonColor::Blue).correct, "ppp");
    }

    #[test]
    fn password_maps_through_table() {
        assert_eq!(Puzzle::password("ABC").correct, "952");
        assert_eq!(Puzzle::password("DEFGHI").correct, "681734");
        assert_eq!(Puzzle::password("SAESI").correct, "984");
    }

    #[test]
    fn middle_rule_rounds_up() {
        assert_eq!(WireRule::Middle.apply(&wires_from("RGBYW")), 3);
        assert_eq!(WireRule::Middle.apply(&wires_from("RGBY")), 2);
        assert_eq!(WireRule::Middle.apply(&wires_from("RGBYWK")), 3);
        assert_eq!(Puzzle::wires(wires_from("KKKKK"), WireRule::Middle).correct, "3");
    }

    #[test]
    fn first_primary_rule() {
        assert_eq!(WireRule::FirstPrimary.apply(&wires_from("YWBKR")), 3);
        assert_eq!(WireRule::FirstPrimary.apply(&wires_from("YWKYW")), 1);
    }

    #[test]
    fn yellow_and_black_rules() {
        assert_eq!(WireRule::LastIfYellow.apply(&wires_from("RGBYW")), 5);
        assert_eq!(WireRule::LastIfYellow.apply(&wires_from("RGBWK")), 1);
        assert_eq!(WireRule::SecondUnlessBlack.apply(&wires_from("RGBWK")), 1);
        assert_eq!(WireRule::SecondUnlessBlack.apply(&wires_from("RGBWY")), 2);
    }

    #[test]
    fn most_frequent_breaks_ties_by_palette() {
        assert_eq!(WireRule::MostFrequent.apply(&wires_from("WKKWY")), 1);
        assert_eq!(WireRule::MostFrequent.apply(&wires_from("KGKGY")), 2);
        assert_eq!(WireRule::MostFrequent.apply(&wires_from("YBYKY")), 1);
        assert_eq!(WireRule::MostFrequent.apply(&wires_from("WKYBG")), 5);
    }

    #[test]
    fn validation_is_exact() {
        let puzzle = Puzzle::button(ButtonColor::Green);
        assert!(validate(&puzzle, "pp"));
        assert!(!validate(&puzzle, "PP"));
        assert!(!validate(&puzzle, "pp "));
        assert!(!validate(&puzzle, ""));
    }

    #[test]
    fn display_shows_kind_details() {
        assert_eq!(Puzzle::button(ButtonColor::Blue).payload.to_string(), "Button Blue");
        assert_eq!(
            Puzzle::password("ABC").payload.to_string(),
            "Password Hash: ABC"
        );
        assert_eq!(
            Puzzle::wires(wires_from("RGBYW"), WireRule::SecondUnlessBlack)
                .payload
                .to_string(),
            "Wires /R/G/B/Y/W/ (Rule 2)"
        );
    }

    #[test]
    fn button_only_weights_never_pick_other_kinds() {
        let mut rng = StdRng::seed_from_u64(3);
        let weights = KindWeights::button_only();
        for _ in 0..200 {
            assert_eq!(weights.pick(&mut rng), ItemKind::Button);
        }
    }

    #[test]
    fn kind_policy_parses_and_picks_weights() {
        assert_eq!("button".parse::<KindPolicy>(), Ok(KindPolicy::ButtonOnly));
        assert_eq!(" Mixed".parse::<KindPolicy>(), Ok(KindPolicy::Mixed));
        assert!("wires".parse::<KindPolicy>().is_err());
        assert_eq!(
            KindPolicy::ButtonOnly.weights(Difficulty::Hard),
            KindWeights::button_only()
        );
        assert_eq!(
            KindPolicy::Mixed.weights(Difficulty::Easy),
            KindWeights::for_difficulty(Difficulty::Easy)
        );
    }

    #[test]
    fn difficulty_weights_reach_every_kind() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = KindWeights::for_difficulty(Difficulty::Medium);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(weights.pick(&mut rng));
        }
        assert_eq!(seen.len(), ItemKind::ALL.len());
    }

    proptest! {
        #[test]
        fn generated_password_matches_difficulty(seed in any::<u64>(), level in 0usize..3) {
            let difficulty = Difficulty::ALL[level];
            let mut rng = StdRng::seed_from_u64(seed);
            let puzzle = generate(ItemKind::Password, difficulty, &mut rng);
            let Payload::Password { hash } = &puzzle.payload else {
                panic!("expected password payload");
            };
            let base = 3 + level;
            prop_assert!(hash.len() == base || hash.len() == base + 1);
            prop_assert!(hash.chars().all(|c| ('A'..='I').contains(&c)));
            prop_assert_eq!(puzzle.correct.len(), hash.len());
            prop_assert!(validate(&puzzle, &puzzle.correct.clone()));
        }

        #[test]
        fn generated_wires_answer_is_a_valid_position(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let puzzle = generate(ItemKind::Wires, Difficulty::Hard, &mut rng);
            let Payload::Wires { wires, rule } = &puzzle.payload else {
                panic!("expected wires payload");
            };
            prop_assert_eq!(wires.len(), 5);
            let position: usize = puzzle.correct.parse().expect("numeric answer");
            prop_assert!((1..=wires.len()).contains(&position));
            prop_assert_eq!(position, rule.apply(wires));
        }

        #[test]
        fn generate_respects_requested_kind(seed in any::<u64>(), kind_idx in 0usize..3) {
            let kind = ItemKind::ALL[kind_idx];
            let mut rng = StdRng::seed_from_u64(seed);
            prop_assert_eq!(generate(kind, Difficulty::Easy, &mut rng).payload.kind(), kind);
        }
    }
}
