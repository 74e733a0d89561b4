//! Fixed UI strings for digests, keyed by (key, language).

use crate::models::user::Language;

/// Looks up a localized string. Unknown keys come back unchanged so a missing
/// entry shows up as the key in the rendered digest instead of failing it.
pub fn t<'a>(key: &'a str, lang: Language) -> &'a str {
    let entry = match lang {
        Language::En => english(key),
        Language::Ko => korean(key),
    };
    entry.unwrap_or(key)
}

fn english(key: &str) -> Option<&'static str> {
    Some(match key {
        "email_subject" => "Your Weekly Research Digest",
        "email_greeting" => "Hello",
        "email_intro" => "Here are this week's top research papers in your topics.",
        "email_no_papers" => "There are no new papers in your topics this week.",
        "email_check_back" => "Check back next week for new updates!",
        "more_papers" => "more papers are waiting in your dashboard.",
        "view_dashboard" => "Open dashboard",
        "unsubscribe" => "Unsubscribe or change preferences",
        "category" => "Category",
        "authors" => "Authors",
        "published" => "Published",
        "summary" => "Summary",
        "ai_evaluation" => "AI Evaluation",
        "keywords" => "Keywords",
        "view_full_paper" => "View full paper",
        "highly_recommended" => "🌟 Highly Recommended",
        "recommended" => "👍 Recommended",
        "worth_reading" => "📖 Worth Reading",
        "chat_header" => "📚 This week's top research updates:",
        "chat_no_papers" => "📚 There are no new research papers this week.",
        "chat_view_more" => "View more research:",
        "content_error_title" => "Content Generation Error",
        "content_error_body" => "We could not prepare your digest this week. Please visit your dashboard.",
        _ => return None,
    })
}

fn korean(key: &str) -> Option<&'static str> {
    Some(match key {
        "email_subject" => "주간 연구 요약 리포트",
        "email_greeting" => "안녕하세요",
        "email_intro" => "구독하신 주제의 이번 주 주요 논문입니다.",
        "email_no_papers" => "이번 주에는 새로운 논문이 없습니다.",
        "email_check_back" => "다음 주에 새로운 소식으로 찾아뵙겠습니다!",
        "more_papers" => "편의 논문이 대시보드에서 기다리고 있습니다.",
        "view_dashboard" => "대시보드 열기",
        "unsubscribe" => "구독 해지 또는 설정 변경",
        "category" => "분류",
        "authors" => "저자",
        "published" => "게시일",
        "summary" => "요약",
        "ai_evaluation" => "AI 평가",
        "keywords" => "키워드",
        "view_full_paper" => "전체 논문 보기",
        "highly_recommended" => "🌟 강력 추천",
        "recommended" => "👍 추천",
        "worth_reading" => "📖 읽어볼 만함",
        "chat_header" => "📚 이번 주 주요 연구 업데이트:",
        "chat_no_papers" => "📚 이번 주에는 새로운 연구 논문이 없습니다.",
        "chat_view_more" => "더 많은 연구 보기:",
        "content_error_title" => "콘텐츠 생성 오류",
        "content_error_body" => "이번 주 요약을 준비하지 못했습니다. 대시보드를 확인해 주세요.",
        _ => return None,
    })
}
