use alloy::sol;

sol! {
    /// Optional ERC-20 metadata extension. Either call may revert on non-conforming tokens.
    #[sol(rpc)]
    interface IERC20Metadata {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}
