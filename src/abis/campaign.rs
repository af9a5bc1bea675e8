use alloy::sol;

sol! {
    struct CampaignInfo {
        uint256 id;
        address owner;
        string title;
        uint256 goal;
        uint256 totalDonated;
        uint256 deadline;
    }

    struct Donation {
        address donor;
        uint256 amount;
        uint256 timestamp;
    }

    #[sol(rpc)]
    interface ICampaignRegistry {
        function getCampaigns() external view returns (CampaignInfo[] memory);
        function getCampaignDonations(uint256 campaignId) external view returns (Donation[] memory);
        function getCampaignTokenBalances(uint256 campaignId) external view returns (address[] memory tokens, uint256[] memory balances);
    }
}
