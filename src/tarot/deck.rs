//! The fixed 78-card Rider-Waite-Smith deck.

use std::sync::LazyLock;

use serde::Serialize;

/// Major or minor arcana.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arcana {
    Major,
    Minor,
}

/// An immutable card from the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: u8,
    pub numeral: String,
    pub name: String,
    pub arcana: Arcana,
    pub summary: String,
    pub description: String,
    pub associated_question: String,
    pub planet: String,
    pub element: String,
    pub zodiac: String,
}

/// Total number of cards in a full deck.
pub const DECK_SIZE: usize = 78;

// (numeral, name, summary, description, question, planet, element, zodiac)
const MAJORS: [(&str, &str, &str, &str, &str, &str, &str, &str); 22] = [
    ("0", "The Fool", "Leap first, figure it out on the way down",
     "Raw potential and a clean slate. Reversed, it warns of recklessness or fear of the jump.",
     "What would you try if you weren't scared of looking foolish?", "Uranus", "Air", "Aquarius"),
    ("I", "The Magician", "You already hold every tool you need",
     "Willpower turned into results. Reversed, talent is scattered or used to manipulate.",
     "Which of your skills are you underusing?", "Mercury", "Air", "Gemini"),
    ("II", "The High Priestess", "Your gut knows before your head does",
     "Intuition, secrets and the unseen. Reversed, you are ignoring your inner voice.",
     "What do you already know but won't admit?", "Moon", "Water", "Cancer"),
    ("III", "The Empress", "Abundance grows where you give it care",
     "Creativity, nurture and sensual comfort. Reversed, creative block or smothering.",
     "What in your life needs more nurturing?", "Venus", "Earth", "Taurus"),
    ("IV", "The Emperor", "Structure is the flex",
     "Authority, order and firm boundaries. Reversed, control turns rigid or absent.",
     "Where do you need firmer boundaries?", "Mars", "Fire", "Aries"),
    ("V", "The Hierophant", "Tradition has lessons, take what fits",
     "Institutions, mentors and shared belief. Reversed, breaking from convention.",
     "Whose rules are you following, and do they serve you?", "Venus", "Earth", "Taurus"),
    ("VI", "The Lovers", "Choose with your whole heart",
     "Union, alignment and meaningful choice. Reversed, disharmony or values out of sync.",
     "What choice would align you with your values?", "Mercury", "Air", "Gemini"),
    ("VII", "The Chariot", "Steer hard, you're winning this",
     "Determination and victory through focus. Reversed, lost direction or stalled drive.",
     "What goal deserves your full momentum?", "Moon", "Water", "Cancer"),
    ("VIII", "Strength", "Soft power hits hardest",
     "Courage, patience and compassion over force. Reversed, self-doubt or raw temper.",
     "Where can gentleness be your strength?", "Sun", "Fire", "Leo"),
    ("IX", "The Hermit", "Log off and look inward",
     "Solitude, reflection and inner guidance. Reversed, isolation turns to loneliness.",
     "What answers might silence reveal?", "Mercury", "Earth", "Virgo"),
    ("X", "Wheel of Fortune", "The cycle is turning, ride it",
     "Fate, luck and turning points. Reversed, resisting change or a run of bad luck.",
     "How can you move with the change instead of against it?", "Jupiter", "Fire", "Sagittarius"),
    ("XI", "Justice", "Receipts always come due",
     "Fairness, truth and cause and effect. Reversed, dishonesty or dodged accountability.",
     "Where do you need to take accountability?", "Venus", "Air", "Libra"),
    ("XII", "The Hanged Man", "Pause, flip the view",
     "Surrender and new perspective. Reversed, stalling or pointless sacrifice.",
     "What might look different from another angle?", "Neptune", "Water", "Pisces"),
    ("XIII", "Death", "Let the old version of you go",
     "Endings that clear space for transformation. Reversed, clinging to what is over.",
     "What are you holding onto that already ended?", "Pluto", "Water", "Scorpio"),
    ("XIV", "Temperance", "Balance beats extremes",
     "Moderation, patience and blending opposites. Reversed, excess or imbalance.",
     "Where could you find a middle path?", "Jupiter", "Fire", "Sagittarius"),
    ("XV", "The Devil", "Name the chain, then drop it",
     "Attachment, temptation and shadow habits. Reversed, breaking free.",
     "What habit has more power over you than it should?", "Saturn", "Earth", "Capricorn"),
    ("XVI", "The Tower", "It's falling apart so it can rebuild",
     "Sudden upheaval and revelation. Reversed, dodging a necessary collapse.",
     "What foundation needs to be rebuilt?", "Mars", "Fire", "Aries"),
    ("XVII", "The Star", "Hope is back on the menu",
     "Healing, renewal and quiet faith. Reversed, discouragement or disconnection.",
     "What gives you hope right now?", "Uranus", "Air", "Aquarius"),
    ("XVIII", "The Moon", "Not everything is what it seems",
     "Illusion, dreams and the subconscious. Reversed, confusion lifting.",
     "What fear is distorting your view?", "Neptune", "Water", "Pisces"),
    ("XIX", "The Sun", "Main character energy, fully lit",
     "Joy, success and vitality. Reversed, a dimmed mood or delayed win.",
     "What lights you up?", "Sun", "Fire", "Leo"),
    ("XX", "Judgement", "The wake-up call is for you",
     "Reckoning, rebirth and answering a calling. Reversed, self-doubt blocks the call.",
     "What calling have you been ignoring?", "Pluto", "Fire", "Scorpio"),
    ("XXI", "The World", "Full circle, you did that",
     "Completion, integration and travel. Reversed, loose ends left hanging.",
     "What cycle are you ready to close?", "Saturn", "Earth", "Capricorn"),
];

// (suit, domain, element, planet, zodiac)
const SUITS: [(&str, &str, &str, &str, &str); 4] = [
    ("Wands", "passion and creative drive", "Fire", "Mars", "Aries, Leo, Sagittarius"),
    ("Cups", "emotions and relationships", "Water", "Moon", "Cancer, Scorpio, Pisces"),
    ("Swords", "thoughts and conflict", "Air", "Mercury", "Gemini, Libra, Aquarius"),
    ("Pentacles", "money, work and the body", "Earth", "Venus", "Taurus, Virgo, Capricorn"),
];

// (rank, numeral, theme, question)
const RANKS: [(&str, &str, &str, &str); 14] = [
    ("Ace", "Ace", "a fresh start", "What new beginning is opening up"),
    ("Two", "II", "a choice between paths", "What decision are you circling"),
    ("Three", "III", "early growth", "What is starting to take shape"),
    ("Four", "IV", "stability", "What foundation are you resting on"),
    ("Five", "V", "friction and loss", "What conflict needs facing"),
    ("Six", "VI", "harmony and recovery", "Where is balance returning"),
    ("Seven", "VII", "standing your ground", "What are you defending"),
    ("Eight", "VIII", "swift movement", "What is picking up speed"),
    ("Nine", "IX", "resilience", "What has tested you and made you stronger"),
    ("Ten", "X", "a cycle completing", "What chapter is closing"),
    ("Page", "Page", "curious new energy", "What are you eager to learn"),
    ("Knight", "Knight", "bold pursuit", "What are you charging toward"),
    ("Queen", "Queen", "nurturing mastery", "How can you hold this with care"),
    ("King", "King", "command and maturity", "Where do you need to lead"),
];

static DECK: LazyLock<Vec<Card>> = LazyLock::new(build_deck);

/// The full deck, built once.
pub fn full_deck() -> &'static [Card] {
    &DECK
}

/// Find a card by name, ignoring case and a leading "the".
pub fn find_card(name: &str) -> Option<&'static Card> {
    let wanted = normalize_name(name);
    if wanted.is_empty() {
        return None;
    }
    full_deck()
        .iter()
        .find(|card| normalize_name(&card.name) == wanted)
}

fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let without_article = lower.strip_prefix("the ").unwrap_or(&lower);
    without_article
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);

    for (numeral, name, summary, description, question, planet, element, zodiac) in MAJORS {
        deck.push(Card {
            id: deck.len() as u8,
            numeral: numeral.to_string(),
            name: name.to_string(),
            arcana: Arcana::Major,
            summary: summary.to_string(),
            description: description.to_string(),
            associated_question: question.to_string(),
            planet: planet.to_string(),
            element: element.to_string(),
            zodiac: zodiac.to_string(),
        });
    }

    for (suit, domain, element, planet, zodiac) in SUITS {
        for (rank, numeral, theme, question) in RANKS {
            let name = format!("{rank} of {suit}");
            deck.push(Card {
                id: deck.len() as u8,
                numeral: numeral.to_string(),
                arcana: Arcana::Minor,
                summary: format!("{} in {domain}", capitalize(theme)),
                description: format!(
                    "The {name} brings {theme} to matters of {domain}. Reversed, that energy is blocked or turned inward."
                ),
                associated_question: format!("{question} in your {domain}?"),
                planet: planet.to_string(),
                element: element.to_string(),
                zodiac: zodiac.to_string(),
                name,
            });
        }
    }

    deck
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
