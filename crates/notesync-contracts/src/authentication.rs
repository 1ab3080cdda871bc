use crate::checks;
use crate::{
    Contract, ContractError, ErrorCode, FieldOutcome, FieldResult, FieldSet, FieldSpec, Lookup,
    Record, RecordError, Repository, UserRow, ValidationError,
};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct AuthScratch {
    user: Option<UserRow>,
}

/// Resolves credentials to a user id.
///
/// Single use: the resolved user feeds the password check, so one instance authenticates
/// exactly one request.
pub struct AuthenticationContract<'a> {
    repo: &'a dyn Repository,
    fields: FieldSet<AuthenticationContract<'a>>,
}

impl<'a> AuthenticationContract<'a> {
    pub fn new(repo: &'a dyn Repository) -> Result<Self, ContractError> {
        let fields = FieldSet::new(
            "authentication",
            vec![
                FieldSpec::new("username", Self::validate_username),
                FieldSpec::new("password", Self::validate_password),
            ],
        )?;
        Ok(Self { repo, fields })
    }

    fn validate_username(&self, scratch: &mut AuthScratch, value: &Value) -> FieldResult {
        let username = checks::expect_str(value).map_err(fail_fast)?;
        match self.repo.find_user_by_username(username)? {
            Lookup::Missing => Err(ValidationError::fail_fast(ErrorCode::DoesNotExist).into()),
            Lookup::Unique(user) => {
                scratch.user = Some(user);
                Ok(FieldOutcome::Pass)
            }
            Lookup::Duplicate(count) => Err(ContractError::Integrity(format!(
                "username {username} matched {count} users"
            ))
            .into()),
        }
    }

    fn validate_password(&self, scratch: &mut AuthScratch, value: &Value) -> FieldResult {
        let password = checks::expect_str(value).map_err(fail_fast)?;
        // No resolved user means username already failed and the record cannot commit.
        let Some(user) = scratch.user.as_ref() else {
            return Ok(FieldOutcome::Pass);
        };
        if self.repo.check_password(user, password) {
            Ok(FieldOutcome::Pass)
        } else {
            Err(ValidationError::fail_fast(ErrorCode::PasswordIncorrect).into())
        }
    }
}

fn fail_fast(mut err: ValidationError) -> ValidationError {
    err.fail_fast = true;
    err
}

impl Contract for AuthenticationContract<'_> {
    type Scratch = AuthScratch;
    type Output = i64;

    fn name(&self) -> &'static str {
        "authentication"
    }

    fn fields(&self) -> &FieldSet<Self> {
        &self.fields
    }

    fn single_use(&self) -> bool {
        true
    }

    fn fail_fast_on_missing(&self) -> bool {
        true
    }

    fn commit(&self, _record: Record, scratch: AuthScratch) -> Result<i64, RecordError> {
        let user = scratch.user.ok_or(ContractError::MissingContext {
            contract: "authentication",
            what: "user",
        })?;
        Ok(user.user_id)
    }
}
