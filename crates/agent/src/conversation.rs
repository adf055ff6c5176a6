use concierge_core::domain::text::tokenize;

/// How the user answered an outstanding confirmation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationReply {
    Affirm,
    Decline,
    Other,
}

/// Deterministic keyword classifier for replies to a confirmation request.
///
/// Phrases match whole tokens only. An affirmative has to lead the reply (after an optional
/// filler such as "please" or "그럼"), so a sentence that merely mentions "ok" somewhere is
/// not a confirmation. Questions and hedged replies ("yes, but ...") are never a
/// confirmation, and a reply that carries a negative word anywhere is a decline.
#[derive(Clone, Debug)]
pub struct ConfirmationClassifier {
    affirm: Vec<Vec<&'static str>>,
    decline: Vec<Vec<&'static str>>,
    hedges: Vec<&'static str>,
    fillers: Vec<&'static str>,
}

const AFFIRM_PHRASES: &[&str] = &[
    "yes",
    "y",
    "yeah",
    "yep",
    "sure",
    "ok",
    "okay",
    "confirm",
    "confirmed",
    "proceed",
    "go ahead",
    "do it",
    "please do",
    "sounds good",
    "네",
    "넵",
    "네네",
    "예",
    "응",
    "그래",
    "그래요",
    "좋아",
    "좋아요",
    "좋습니다",
    "확인",
    "확인해요",
    "확인했어요",
    "확인합니다",
    "확인해주세요",
    "확인해 주세요",
    "진행",
    "진행해",
    "진행해요",
    "진행해줘",
    "진행합니다",
    "진행해주세요",
    "진행해 주세요",
    "신청해주세요",
    "신청해 주세요",
];

const DECLINE_PHRASES: &[&str] = &[
    "no",
    "n",
    "nope",
    "nah",
    "cancel",
    "stop",
    "dont",
    "don't",
    "do not",
    "never mind",
    "nevermind",
    "not now",
    "아니",
    "아니요",
    "아니오",
    "아뇨",
    "안",
    "취소",
    "취소해",
    "취소해요",
    "취소할게요",
    "취소해주세요",
    "싫어",
    "싫어요",
    "그만",
    "그만해",
    "그만해요",
    "됐어요",
];

const HEDGES: &[&str] = &["but", "however", "before", "근데", "그런데", "하지만", "먼저"];

const LEADING_FILLERS: &[&str] = &["please", "then", "so", "well", "i", "그럼", "그러면"];

impl Default for ConfirmationClassifier {
    fn default() -> Self {
        let split = |phrases: &[&'static str]| -> Vec<Vec<&'static str>> {
            phrases.iter().map(|phrase| phrase.split(' ').collect()).collect()
        };
        Self {
            affirm: split(AFFIRM_PHRASES),
            decline: split(DECLINE_PHRASES),
            hedges: HEDGES.to_vec(),
            fillers: LEADING_FILLERS.to_vec(),
        }
    }
}

impl ConfirmationClassifier {
    pub fn classify(&self, text: &str) -> ConfirmationReply {
        if is_question(text) {
            return ConfirmationReply::Other;
        }

        let tokens = tokenize(text);
        let tokens = tokens.iter().map(String::as_str).collect::<Vec<_>>();

        let declined = (0..tokens.len())
            .any(|start| self.decline.iter().any(|phrase| phrase_at(&tokens, start, phrase)));
        if declined {
            return ConfirmationReply::Decline;
        }
        if tokens.iter().any(|token| self.hedges.contains(token)) {
            return ConfirmationReply::Other;
        }

        for (start, token) in tokens.iter().enumerate() {
            if self.affirm.iter().any(|phrase| phrase_at(&tokens, start, phrase)) {
                return ConfirmationReply::Affirm;
            }
            if !self.fillers.contains(token) {
                break;
            }
        }
        ConfirmationReply::Other
    }
}

fn is_question(text: &str) -> bool {
    text.trim_end().ends_with(['?', '？'])
}

fn phrase_at(tokens: &[&str], start: usize, phrase: &[&str]) -> bool {
    tokens.get(start..start + phrase.len()).is_some_and(|window| window == phrase)
}

#[cfg(test)]
mod tests {
    use super::{ConfirmationClassifier, ConfirmationReply};

    #[test]
    fn affirmative_replies() {
        let classifier = ConfirmationClassifier::default();
        for text in [
            "yes",
            "Yes, confirm",
            "ok go ahead!",
            "sure.",
            "please go ahead",
            "I confirm",
            "네, 진행해주세요",
            "네 진행해 주세요",
            "그럼 진행해요",
            "좋아요",
        ] {
            assert_eq!(classifier.classify(text), ConfirmationReply::Affirm, "{text}");
        }
    }

    #[test]
    fn negative_replies_win_over_affirmative_words() {
        let classifier = ConfirmationClassifier::default();
        for text in [
            "no",
            "No thanks",
            "yes... actually no",
            "don't do it",
            "취소할게요",
            "아니요",
        ] {
            assert_eq!(classifier.classify(text), ConfirmationReply::Decline, "{text}");
        }
    }

    #[test]
    fn unrelated_text_is_other() {
        let classifier = ConfirmationClassifier::default();
        for text in ["what about the travel card?", "yesterday's statement", "know more"] {
            assert_eq!(classifier.classify(text), ConfirmationReply::Other, "{text}");
        }
    }

    #[test]
    fn korean_affirmatives_do_not_match_inside_other_words() {
        let classifier = ConfirmationClassifier::default();
        for text in [
            "연회비가 얼마예요?",
            "예산이 얼마나 되나요",
            "응답이 늦네요",
            "카드네요",
            "예약 먼저 할게요",
        ] {
            assert_eq!(classifier.classify(text), ConfirmationReply::Other, "{text}");
        }
    }

    #[test]
    fn affirmative_words_that_do_not_lead_the_reply_are_other() {
        let classifier = ConfirmationClassifier::default();
        for text in [
            "is it ok to check the fee first?",
            "Is it ok if I check the fee first",
            "what happens if I say yes",
            "yes, but what is the annual fee?",
            "sure, but show me the benefits before applying",
            "네 근데 연회비는요",
        ] {
            assert_eq!(classifier.classify(text), ConfirmationReply::Other, "{text}");
        }
    }
}
