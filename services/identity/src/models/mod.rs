//! Identity service models

pub mod pagination;
pub mod requests;
pub mod role;
pub mod user;

// Re-export for convenience
pub use pagination::{PageRequest, Pagination};
pub use requests::{
    DeleteUserRequest, ListUsersRequest, ListUsersResponse, LoginRequest, LoginResponse,
    RefreshTokenResponse, RegisterRequest, RegisterResponse, ResendVerifyEmailRequest,
    ResendVerifyPhoneNumberRequest, UpdateUserRequest, UpdateUserResponse, UserFilter,
    VerifyEmailRequest, VerifyPhoneNumberRequest, VerifyResponse,
};
pub use role::Role;
pub use user::{NewUser, User, UserResponse, UserSummary};
