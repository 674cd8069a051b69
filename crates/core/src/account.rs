// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accounts own the credentials a crawl runs with.

crate::define_id! {
    /// Identifier of the credential-owning account a job crawls as.
    ///
    /// Assigned by the backend; the prefix only applies to generated IDs.
    pub struct AccountId("acc-");
}
