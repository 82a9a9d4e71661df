use askama::Template;

#[derive(Template)]
#[template(path = "alert_mail.html")]
pub(crate) struct AlertMailTemplate<'a> {
    pub(crate) app_name: &'a str,
    pub(crate) recipient: &'a str,
    pub(crate) accent: &'a str,
    pub(crate) title: &'a str,
    pub(crate) message: &'a str,
}

#[derive(Template)]
#[template(path = "digest_mail.html")]
pub(crate) struct DigestMailTemplate<'a> {
    pub(crate) app_name: &'a str,
    pub(crate) recipient: &'a str,
    pub(crate) entries: Vec<DigestEntry<'a>>,
}

pub(crate) struct DigestEntry<'a> {
    pub(crate) accent: &'a str,
    pub(crate) title: &'a str,
    pub(crate) message: &'a str,
}

#[derive(Template)]
#[template(path = "test_mail.html")]
pub(crate) struct TestMailTemplate<'a> {
    pub(crate) app_name: &'a str,
}
