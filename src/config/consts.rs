// src/config/consts.rs

// Bibliographic registry (KCI)
pub const KCI_BASE: &str = "https://www.kci.go.kr";
pub const KCI_MAIN: &str = "/kciportal/main.kci";
pub const KCI_LOGIN_FORM: &str = "/kciportal/po/member/popup/loginForm.kci";
pub const KCI_ARTICLE_VIEW: &str =
    "/kciportal/ci/sereArticleSearch/ciSereArtiView.kci?sereArticleSearchBean.artiId={record}";
pub const KCI_AUTHOR_PROFILE: &str =
    "/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId={author}&citationBean.artiId={record}";
pub const KCI_AUTHOR_PROFILE_ONLY: &str =
    "/kciportal/po/citationindex/poCretDetail.kci?citationBean.cretId={author}";
pub const KCI_AUTHOR_LINK: &str = "poCretDetail.kci";
pub const KCI_AUTHOR_PARAM: &str = "citationBean.cretId";
pub const KCI_RECORD_PARAM: &str = "citationBean.artiId";
pub const KCI_CROSS_ID_FIELD: &str = "citationBean.kriCretId";

// Demographic registry (KRI)
pub const KRI_BASE: &str = "https://www.kri.go.kr";
pub const KRI_MAIN: &str = "/kri2";
pub const KRI_MENU_SEARCH: &str = "ico-search";
pub const KRI_MENU_NAME_SEARCH: &str = "MNU_1103";
pub const KRI_NAME_INPUT: &str = "txtKorNm";
pub const KRI_ID_INPUT: &str = "#txtSearchRschrRegNo";
pub const KRI_SEARCH_ACTION: &str = "SEARCH";
pub const KRI_NAME_COL: &str = "HideCol0C6";
pub const KRI_NAME_HEADER: &str = "성명";

// Shared login markers
pub const LOGOUT_MARKER: &str = "로그아웃";
pub const USER_INPUT: &str = "#uid";
pub const PASSWORD_INPUT: &str = "#upw";

// Session
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const REQUEST_TIMEOUT_MS: u64 = 20_000;
pub const READY_TIMEOUT_MS: u64 = 10_000;
pub const POLL_INTERVAL_MS: u64 = 500;
pub const FORM_WAIT_MS: u64 = 10_000;

// Search pacing
pub const SETTLE_MS: u64 = 2_000;
pub const RETRY_SETTLE_MS: u64 = 3_500;

// Run
pub const SNAPSHOT_EVERY: usize = 10;
pub const SNAPSHOT_DIR: &str = "revise_data";
pub const PAUSE_MS: [u64; 2] = [2_000, 3_000]; // be polite

// Local state
pub const DEBUG_LOG: &str = ".store/debug.log";
pub const DEBUG_DIR: &str = ".store/debug";

// Credentials (environment)
pub const ENV_BIBLIO_USER: &str = "ENRICH_BIBLIO_USER";
pub const ENV_BIBLIO_PASSWORD: &str = "ENRICH_BIBLIO_PASSWORD";
pub const ENV_DEMO_USER: &str = "ENRICH_DEMO_USER";
pub const ENV_DEMO_PASSWORD: &str = "ENRICH_DEMO_PASSWORD";
