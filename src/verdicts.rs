//! The book of verdicts.
//!
//! Fixed bilingual sentence pools, one list per destiny state, plus the
//! deterministic selector. The fortune teller *selects* from the book — it
//! never writes new verdicts. Identical feature records always select the
//! identical sentence; share links depend on that.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::features::Features;
use crate::state::DestinyState;

/// Supported reply locales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl Language {
    /// Lossy parse of a client-supplied locale tag. Anything but `zh`/`en`
    /// falls back to the caller's default locale, which normally comes from
    /// config.
    pub fn from_tag_or(tag: Option<&str>, fallback: Self) -> Self {
        match tag {
            Some("zh") => Self::Zh,
            Some("en") => Self::En,
            _ => fallback,
        }
    }
}

const HESITATING_ZH: [&str; 5] = [
    "犹豫时机已过，拖延的后果由你承担",
    "左右为难是因为答案早已明了，只是不愿承认",
    "你的迟疑会让机会从指缝溜走，两手空空",
    "选择困难症的代价是：两边都会失去",
    "纠结越久，结局越糟",
];

const ALREADY_DECIDED_ZH: [&str; 5] = [
    "你心里早有答案，只是想要一个赞同而已",
    "决定早已做出，何必装作犹豫",
    "你不是在问我，你是在说服自己",
    "明知故问的人，往往会为固执买单",
    "既然已经决定了，何必浪费我的时间",
];

const UNWILLING_ZH: [&str; 5] = [
    "不甘心的后果是：更不甘心",
    "反复确认不会改变结局，只会延长痛苦",
    "执念越深，陷得越深",
    "你越是不信，现实越会证明给你看",
    "算第三次的人，是在寻求谎言",
];

const MIDNIGHT_ESCAPE_ZH: [&str; 5] = [
    "深夜不睡来算命，逃避解决不了问题",
    "凌晨的焦虑会在天亮后加倍奉还",
    "失眠算命的人，白天会后悔",
    "深夜的决定，往往是错误的",
    "黑夜给了你黑色的眼睛，你却用它来逃避",
];

const SELF_DECEPTION_ZH: [&str; 5] = [
    "连问题都问不出口，说明你已经知道答案了",
    "空白的问题，暴露的是空虚的心",
    "无话可说时，沉默比谎言更诚实",
    "你不是没有问题，是不敢面对问题",
    "什么都不说，说明你什么都知道",
];

const FIRST_TIME_ZH: [&str; 5] = [
    "初问天机，答案会比你想象的更残酷",
    "第一次算命的人，往往承受不住真相",
    "你来得太晚了，时机已经过去",
    "新手的运气不会站在你这边",
    "第一卦就是定局，别想着重来",
];

const REPEATED_ZH: [&str; 5] = [
    "反复问同一件事，只能得到更糟的答案",
    "第N次算命的人，是在等待奇迹，但奇迹不会来",
    "重复提问不会改变命运，只会浪费时间",
    "你已经问过了，答案不会因为你的执着而改变",
    "算得越多，越证明你已经输了",
];

const EMPTY_HEART_ZH: [&str; 5] = [
    "空无一物的心，得到的也是空无一物",
    "连问题都没有的人，不配得到答案",
    "虚空问虚空，得到的只有虚空",
    "无问即无答，这就是你的命",
    "什么都不想说，那就什么都别得到",
];

const SEEKING_CONFIRMATION_ZH: [&str; 5] = [
    "寻求确认的人，最终会被现实否定",
    "你的笃定会在三天内崩塌",
    "确认是虚假的安全感，现实会给你真相",
    "斩钉截铁的人，往往会栽在细节上",
    "你想要的确认，恰恰是你的软肋",
];

const HESITATING_EN: [&str; 5] = [
    "The moment for hesitation has passed, you'll bear the consequences of delay",
    "You struggle because the answer is clear, you just refuse to admit it",
    "Your indecision will let opportunity slip through your fingers",
    "The price of being torn is losing both sides",
    "The longer you dwell, the worse the outcome",
];

const ALREADY_DECIDED_EN: [&str; 5] = [
    "You already know the answer, you just want approval",
    "The decision is made, why pretend to hesitate",
    "You're not asking me, you're convincing yourself",
    "Those who ask knowingly often pay for their stubbornness",
    "Since you've decided, why waste my time",
];

const UNWILLING_EN: [&str; 5] = [
    "The consequence of unwillingness is: more unwillingness",
    "Repeated confirmation won't change the ending, only prolong the pain",
    "The deeper the obsession, the deeper you sink",
    "The more you disbelieve, the more reality will prove you wrong",
    "Those who ask a third time are seeking lies",
];

const MIDNIGHT_ESCAPE_EN: [&str; 5] = [
    "Seeking fortune at midnight won't solve your problems",
    "Pre-dawn anxiety will return doubled in daylight",
    "Those who divine while sleepless will regret it by day",
    "Midnight decisions are often wrong",
    "Night gave you dark eyes, yet you use them to escape",
];

const SELF_DECEPTION_EN: [&str; 5] = [
    "Can't even voice the question means you already know the answer",
    "Empty questions expose an empty heart",
    "When speechless, silence is more honest than lies",
    "You don't lack questions, you fear facing them",
    "Saying nothing means you know everything",
];

const FIRST_TIME_EN: [&str; 5] = [
    "First time asking fate, the answer will be crueler than you imagine",
    "First-timers often can't bear the truth",
    "You came too late, the moment has passed",
    "Beginner's luck won't be on your side",
    "The first reading is final, don't think of retrying",
];

const REPEATED_EN: [&str; 5] = [
    "Asking repeatedly only gets worse answers",
    "Those who ask N times are waiting for miracles, but miracles won't come",
    "Repeated questions won't change fate, only waste time",
    "You've asked before, persistence won't change the answer",
    "The more you ask, the more you prove you've lost",
];

const EMPTY_HEART_EN: [&str; 5] = [
    "An empty heart receives only emptiness",
    "Those without questions don't deserve answers",
    "Void asks void, void is all you get",
    "No question means no answer, that's your fate",
    "If you won't speak, you'll get nothing",
];

const SEEKING_CONFIRMATION_EN: [&str; 5] = [
    "Those seeking confirmation will be denied by reality",
    "Your certainty will crumble within three days",
    "Confirmation is false security, reality will show the truth",
    "The resolute often stumble on details",
    "The confirmation you seek is exactly your weakness",
];

/// Fixed verdict list for a (state, language) pair.
///
/// Total by construction: every state has a list in both languages. Kept as
/// a function rather than a map so a missing entry is a compile error, not a
/// runtime fallback — the FirstTime fallback lives in callers that look up
/// by untrusted state labels.
pub fn verdicts_for(state: DestinyState, language: Language) -> &'static [&'static str; 5] {
    match language {
        Language::Zh => match state {
            DestinyState::Hesitating => &HESITATING_ZH,
            DestinyState::AlreadyDecided => &ALREADY_DECIDED_ZH,
            DestinyState::Unwilling => &UNWILLING_ZH,
            DestinyState::MidnightEscape => &MIDNIGHT_ESCAPE_ZH,
            DestinyState::SelfDeception => &SELF_DECEPTION_ZH,
            DestinyState::FirstTime => &FIRST_TIME_ZH,
            DestinyState::Repeated => &REPEATED_ZH,
            DestinyState::EmptyHeart => &EMPTY_HEART_ZH,
            DestinyState::SeekingConfirmation => &SEEKING_CONFIRMATION_ZH,
        },
        Language::En => match state {
            DestinyState::Hesitating => &HESITATING_EN,
            DestinyState::AlreadyDecided => &ALREADY_DECIDED_EN,
            DestinyState::Unwilling => &UNWILLING_EN,
            DestinyState::MidnightEscape => &MIDNIGHT_ESCAPE_EN,
            DestinyState::SelfDeception => &SELF_DECEPTION_EN,
            DestinyState::FirstTime => &FIRST_TIME_EN,
            DestinyState::Repeated => &REPEATED_EN,
            DestinyState::EmptyHeart => &EMPTY_HEART_EN,
            DestinyState::SeekingConfirmation => &SEEKING_CONFIRMATION_EN,
        },
    }
}

/// Deterministically select one verdict from the pool.
///
/// The index formula (coefficients 7/3/5/11, modulo pool length) is part of
/// the external contract: identical feature records must reselect the
/// identical sentence, so share links can re-derive the mother verdict.
pub fn select(state: DestinyState, features: &Features, language: Language) -> &'static str {
    let verdicts = verdicts_for(state, language);

    let index = (features.attempt_count * 7
        + features.char_length * 3
        + features.hour as usize * 5
        + usize::from(features.has_question_mark) * 11)
        % verdicts.len();

    tracing::info!(state = %state, index, "selected verdict from pool");
    verdicts[index]
}
