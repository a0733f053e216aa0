//! Inputs shared by the decode benchmarks.

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    input: TestInput,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, input: TestInput) -> Self {
        Self { name, group, input }
    }

    pub fn small(name: &'static str, input: TestInput) -> Self {
        Self::new(name, TestGroup::Small, input)
    }

    pub fn normal(name: &'static str, input: TestInput) -> Self {
        Self::new(name, TestGroup::Normal, input)
    }

    pub fn large(name: &'static str, input: TestInput) -> Self {
        Self::new(name, TestGroup::Large, input)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn input(&self) -> &TestInput {
        &self.input
    }
}

/// Raw environment values as a gateway would hand them over.
#[derive(Debug, Copy, Clone)]
pub struct TestInput {
    pub path: &'static [u8],
    pub query: &'static [u8],
    pub cookie: &'static [u8],
}

impl TestInput {
    pub const fn new(path: &'static [u8], query: &'static [u8], cookie: &'static [u8]) -> Self {
        Self { path, query, cookie }
    }

    /// Total number of raw bytes to decode.
    pub fn len(&self) -> usize {
        self.path.len() + self.query.len() + self.cookie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

pub static ASCII: TestInput = TestInput::new(b"/articles/2024/hello-world/", b"page=2&sort=date", b"theme=dark; lang=en");

pub static ESCAPED: TestInput = TestInput::new(
    b"/caf\xc3\xa9/%E2%98%80/\xe2\x99\xa5/",
    b"want=caf%C3%A9&q=%E2%9C%93+done&x=%3D%25",
    b"want=\"caf\\303\\251\"; theme=dark",
);

pub static BROKEN: TestInput = TestInput::new(
    b"/\xe2\x99\xe2\x99\xa5/\xa7%\x10\x98%/\xe2\xa8\x87\x87\xa5\xe2\xa8\xa0",
    b"want=caf\xe9&q=%E9%E9&empty&=",
    b"x=W\x03c(h]\x8e; ok=yes; \"unbalanced=1",
);

pub static LONG: TestInput = TestInput::new(
    b"/static/assets/vendor/library/dist/esm/components/navigation/menu/item/index.js",
    b"utm_source=newsletter&utm_medium=email&utm_campaign=spring&utm_term=caf%C3%A9&utm_content=banner&ref=home&session=8f14e45fceea167a5a36dedd4bea2543",
    b"sessionid=8f14e45fceea167a5a36dedd4bea2543; csrftoken=c9f0f895fb98ab9159f51fd0297e236d; theme=dark; lang=en; tz=\"Europe/Paris\"",
);
