use crate::domain::Clock;
use anyhow::anyhow;
use chrono::NaiveDate;
use std::sync::Mutex;

/// Whether an in-memory driven port should behave like a reachable store or fail every call
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    pub fn blow_up_if_disconnected(&self) -> Result<(), anyhow::Error> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(anyhow!("store is unreachable")),
        }
    }
}

/// Clock pinned to a date the test controls. Wrap it in an [std::sync::Arc] to keep a handle
/// for moving the date while the code under test owns the clock.
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn on(year: i32, month: u32, day: u32) -> FixedClock {
        FixedClock {
            today: Mutex::new(date(year, month, day)),
        }
    }

    pub fn set_today(&self, new_today: NaiveDate) {
        *self.today.lock().expect("fixed clock mutex poisoned") = new_today;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().expect("fixed clock mutex poisoned")
    }
}

/// Shorthand for building a calendar date in tests
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("test used an invalid calendar date")
}

/// Records the arguments of every call to a faked driving port and hands back a canned result.
/// Hand-rolled because trait mocking crates struggle with async fn in traits.
///
/// ```ignore
/// impl SessionPort for Mutex<MockSessionService> {
///     async fn sign_out(&self, token: &str, registry: &SessionRegistry) -> bool {
///         let mut locked = self.lock().expect("mock mutex poisoned");
///         locked.sign_out_result.save_arguments(token.to_owned());
///         locked.sign_out_result.return_value_result().is_ok()
///     }
/// }
/// ```
pub struct FakeImplementation<Args, Ret> {
    saved_arguments: Vec<Args>,
    return_value: Option<Ret>,
}

impl<Args, Ret> FakeImplementation<Args, Ret> {
    pub fn new() -> FakeImplementation<Args, Ret> {
        FakeImplementation {
            saved_arguments: Vec::new(),
            return_value: None,
        }
    }

    pub fn save_arguments(&mut self, arguments: Args) {
        self.saved_arguments.push(arguments)
    }

    /// Arguments of every call so far, oldest first
    pub fn calls(&self) -> &[Args] {
        self.saved_arguments.as_slice()
    }
}

impl<Args, Success, Fail> FakeImplementation<Args, Result<Success, Fail>>
where
    Success: Clone,
    Fail: Clone,
{
    pub fn set_returned_result(&mut self, return_value: Result<Success, Fail>) {
        self.return_value = Some(return_value);
    }

    pub fn return_value_result(&self) -> Result<Success, Fail> {
        self.return_value
            .clone()
            .unwrap_or_else(|| panic!("faked port was called before its result was set"))
    }
}

/// [anyhow::Error] can't be cloned, so failures are stored by their message and rebuilt on each call
impl<Args, Success> FakeImplementation<Args, anyhow::Result<Success>>
where
    Success: Clone,
{
    pub fn set_returned_anyhow(&mut self, return_value: anyhow::Result<Success>) {
        self.return_value = Some(return_value.map_err(|err| anyhow!(err.to_string())));
    }

    pub fn return_value_anyhow(&self) -> anyhow::Result<Success> {
        match self.return_value {
            None => panic!("faked port was called before its result was set"),
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(anyhow!(err.to_string())),
        }
    }
}
