use justerror::Error;

pub type CoreResult<T = ()> = Result<T, ContainerError>;

#[Error]
#[derive(Eq, PartialEq)]
pub enum ContainerError {
    /// Sequence `0` is reserved and never tags a stored row.
    InvalidSequence,
    /// Entity rows cannot be added to a container holding static rows.
    NormalRowInStaticContainer,
    /// Static rows cannot be added to a container already holding entity rows.
    StaticRowInNormalContainer,
}
